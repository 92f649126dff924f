//! Gemini-like structured-output provider.
//!
//! Uses the generateContent API with systemInstruction and an optional
//! constrained response schema. Chat sessions are held by the adapter,
//! keyed by model + language; every turn replays the accumulated contents.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{GenerationOptions, Provider, ProviderRequest, ResponseFormat, Role, SessionKey};
use crate::config::ProviderKind;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct GeminiProvider {
    client: HttpClient,
    api_key: String,
    base_url: String,
    sessions: Mutex<HashMap<SessionKey, GeminiSession>>,
}

struct GeminiSession {
    system: String,
    contents: Vec<GeminiContent>,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            model,
            self.api_key
        )
    }

    fn generation_config(options: &GenerationOptions) -> Option<GeminiGenerationConfig> {
        let mut config = GeminiGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
            response_mime_type: None,
            response_schema: None,
        };

        match &options.format {
            ResponseFormat::Text => {}
            ResponseFormat::Json => {
                config.response_mime_type = Some("application/json".into());
            }
            ResponseFormat::JsonSchema(schema) => {
                config.response_mime_type = Some("application/json".into());
                config.response_schema = Some(schema.clone());
            }
        }

        if config.temperature.is_none()
            && config.max_output_tokens.is_none()
            && config.response_mime_type.is_none()
        {
            None
        } else {
            Some(config)
        }
    }

    async fn generate(
        &self,
        model: &str,
        system: Option<String>,
        contents: Vec<GeminiContent>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let request = GeminiRequest {
            contents,
            system_instruction: system.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart { text }],
            }),
            generation_config: Self::generation_config(options),
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .json(&request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Error::provider(None, None, e.to_string()))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GeminiErrorBody>(&body)
                .ok()
                .map(|b| b.error);
            let code = detail
                .as_ref()
                .and_then(|d| d.status.clone().or_else(|| d.code.map(|c| c.to_string())));
            let message = detail
                .and_then(|d| d.message)
                .unwrap_or_else(|| body.chars().take(300).collect());
            warn!(status = %http_status, "gemini request failed");
            return Err(Error::provider(Some(http_status.as_u16()), code, message));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(None, None, format!("decode response: {e}")))?;

        if let Some(err) = api_response.error {
            let code = err.status.clone().or_else(|| err.code.map(|c| c.to_string()));
            return Err(Error::provider(
                None,
                code,
                err.message.unwrap_or_else(|| "provider error".into()),
            ));
        }

        let text: String = api_response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::provider(None, None, "response contained no candidates"));
        }
        Ok(text)
    }

    /// Snapshot the session contents with the new user turn appended,
    /// creating the session on first use. The lock is never held across an
    /// await.
    fn session_turn(&self, key: &SessionKey, system: &str, text: &str) -> (String, Vec<GeminiContent>) {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        let session = sessions.entry(key.clone()).or_insert_with(|| {
            debug!(model = %key.model, language = ?key.language, "opening gemini session");
            GeminiSession {
                system: system.to_string(),
                contents: Vec::new(),
            }
        });

        let mut contents = session.contents.clone();
        contents.push(GeminiContent::user(text));
        (session.system.clone(), contents)
    }

    /// Commit the turn after a successful response. A session reset during
    /// the round-trip discards the write-back.
    fn commit_turn(&self, key: &SessionKey, mut contents: Vec<GeminiContent>, reply: &str) {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        if let Some(session) = sessions.get_mut(key) {
            contents.push(GeminiContent::model(reply));
            session.contents = contents;
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GeminiLike
    }

    async fn invoke(&self, model: &str, request: ProviderRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(Error::Configuration("missing Gemini API key".into()));
        }

        match request {
            ProviderRequest::Prompt {
                system,
                prompt,
                options,
            } => {
                self.generate(model, system, vec![GeminiContent::user(&prompt)], &options)
                    .await
            }
            ProviderRequest::Conversation { messages, options } => {
                let mut system = None;
                let mut contents = Vec::new();
                for msg in messages {
                    match msg.role {
                        Role::System => system = Some(msg.content),
                        Role::User => contents.push(GeminiContent::user(&msg.content)),
                        Role::Assistant => contents.push(GeminiContent::model(&msg.content)),
                    }
                }
                self.generate(model, system, contents, &options).await
            }
            ProviderRequest::SessionTurn {
                key,
                system,
                text,
                options,
            } => {
                let (system, contents) = self.session_turn(&key, &system, &text);
                let reply = self
                    .generate(model, Some(system), contents.clone(), &options)
                    .await?;
                self.commit_turn(&key, contents, &reply);
                Ok(reply)
            }
        }
    }

    fn reset_session(&self, key: &SessionKey) {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        if sessions.remove(key).is_some() {
            debug!(model = %key.model, language = ?key.language, "gemini session reset");
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Clone)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user(text: &str) -> Self {
        Self {
            role: "user".into(),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".into(),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

#[derive(Serialize, Clone)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    code: Option<i64>,
    message: Option<String>,
    status: Option<String>,
}
