//! OpenAI-compatible chat-completions provider.
//!
//! Stateless: the caller supplies the full message history on every call.
//! JSON mode is requested through response_format; the backend may still
//! wrap the payload in a fenced code block, which is stripped here before
//! the text is returned.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{strip_code_fences, Provider, ProviderRequest, Role, SessionKey};
use crate::config::ProviderKind;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiProvider {
    client: HttpClient,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    async fn invoke(&self, model: &str, request: ProviderRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(Error::Configuration("missing API key for chat backend".into()));
        }

        let (messages, options) = match request {
            ProviderRequest::Prompt {
                system,
                prompt,
                options,
            } => {
                let mut messages = Vec::new();
                if let Some(system) = system {
                    messages.push(WireMessage {
                        role: Role::System.as_str(),
                        content: system,
                    });
                }
                messages.push(WireMessage {
                    role: Role::User.as_str(),
                    content: prompt,
                });
                (messages, options)
            }
            ProviderRequest::Conversation { messages, options } => (
                messages
                    .into_iter()
                    .map(|m| WireMessage {
                        role: m.role.as_str(),
                        content: m.content,
                    })
                    .collect(),
                options,
            ),
            ProviderRequest::SessionTurn { .. } => {
                return Err(Error::Configuration(
                    "chat-completions backend is stateless; supply the full history".into(),
                ));
            }
        };

        let wants_json = options.format.wants_json();
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: wants_json.then(|| WireResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Error::provider(None, None, e.to_string()))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<WireErrorBody>(&body).ok().map(|b| b.error);
            let code = detail.as_ref().and_then(|d| d.code.clone());
            let message = detail
                .and_then(|d| d.message)
                .unwrap_or_else(|| body.chars().take(300).collect());
            warn!(status = %http_status, "chat-completions request failed");
            return Err(Error::provider(Some(http_status.as_u16()), code, message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(None, None, format!("decode response: {e}")))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::provider(None, None, "no choices in response"))?;

        if wants_json {
            Ok(strip_code_fences(&content))
        } else {
            Ok(content)
        }
    }

    fn reset_session(&self, _key: &SessionKey) {}
}

// ============================================================================
// API Types (OpenAI-compatible Chat Completions format)
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use crate::llm::provider::GenerationOptions;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn test_missing_key_fails_before_network() {
        let provider = OpenAiProvider::new(String::new(), None);
        let request = ProviderRequest::Prompt {
            system: None,
            prompt: "hello".into(),
            options: GenerationOptions::default(),
        };
        let err = block_on(provider.invoke("gpt-4o-mini", request)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_session_turns_rejected() {
        let provider = OpenAiProvider::new("sk-test".into(), None);
        let request = ProviderRequest::SessionTurn {
            key: SessionKey::new("gpt-4o-mini", Language::English),
            system: "s".into(),
            text: "t".into(),
            options: GenerationOptions::default(),
        };
        let err = block_on(provider.invoke("gpt-4o-mini", request)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_endpoint_respects_base_url() {
        let provider = OpenAiProvider::new("sk".into(), Some("https://proxy.local/v1/".into()));
        assert_eq!(provider.endpoint(), "https://proxy.local/v1/chat/completions");
    }
}
