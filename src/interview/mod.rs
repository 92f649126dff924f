//! Interview session state machine.
//!
//! One multi-turn chat session per (provider-kind, language) pair. The
//! backend representation is mutually exclusive: either a structured
//! session key (provider-held history) or a locally-held message list,
//! never both. A language change tears the session down entirely because
//! system instructions are language-specific.

mod prompts;

pub use prompts::{closing_instruction, parse_failure_question, system_instruction};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Feature, Language, ProviderKind};
use crate::error::Result;
use crate::llm::{
    strip_code_fences, ChatMessage, GenerationOptions, PromptServices, ProviderRequest, Role,
    SessionKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Ai,
    System,
}

/// One transcript entry. Append-only; never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewTurn {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl InterviewTurn {
    fn now(speaker: Speaker, text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            options,
            timestamp: Utc::now(),
        }
    }
}

/// Parsed interview reply, normalized from the model's JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewReply {
    pub question: String,
    pub options: Vec<String>,
    pub is_final_draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_prompt: Option<String>,
}

enum Backend {
    /// Provider-held history behind a session key.
    Structured { key: SessionKey, system: String },
    /// Locally-held message history for stateless backends.
    Local { messages: Vec<ChatMessage> },
}

pub struct InterviewSession {
    services: Arc<PromptServices>,
    language: Language,
    backend: Option<Backend>,
    transcript: Vec<InterviewTurn>,
}

impl InterviewSession {
    pub fn new(services: Arc<PromptServices>) -> Self {
        let language = services.settings().language;
        Self {
            services,
            language,
            backend: None,
            transcript: Vec::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn transcript(&self) -> &[InterviewTurn] {
        &self.transcript
    }

    /// Open a session for `language`. Resolves the Interview feature and
    /// picks the backend representation from the routed provider kind.
    pub fn start(&mut self, language: Language) -> Result<()> {
        let resolved = self.services.resolve(Feature::Interview)?;
        let system = system_instruction(language);

        let backend = match resolved.config.provider {
            ProviderKind::GeminiLike => {
                let key = SessionKey::new(resolved.config.model_name.clone(), language);
                // A stale provider-side session under the same key would
                // leak history from a previous run.
                self.services.reset_session(Feature::Interview, &key)?;
                Backend::Structured {
                    key,
                    system: system.clone(),
                }
            }
            ProviderKind::OpenAiCompatible => Backend::Local {
                messages: vec![ChatMessage::new(Role::System, system.clone())],
            },
        };

        debug!(language = ?language, model = %resolved.config.model_name, "interview session started");
        self.language = language;
        self.backend = Some(backend);
        self.transcript.clear();
        self.transcript
            .push(InterviewTurn::now(Speaker::System, system, Vec::new()));
        Ok(())
    }

    /// Tear the session down and open a fresh one. No partial reuse.
    pub fn restart(&mut self, language: Language) -> Result<()> {
        if let Some(Backend::Structured { key, .. }) = &self.backend {
            let _ = self.services.reset_session(Feature::Interview, key);
        }
        self.backend = None;
        self.transcript.clear();
        self.start(language)
    }

    /// Send one user answer and get the next question (or the final draft).
    /// Starts a session implicitly when none exists. Malformed model JSON
    /// yields a localized sentinel reply instead of an error.
    pub async fn send_turn(&mut self, user_text: &str) -> Result<InterviewReply> {
        if self.backend.is_none() {
            self.start(self.language)?;
        }

        self.transcript
            .push(InterviewTurn::now(Speaker::User, user_text, Vec::new()));

        let raw = self.exchange(user_text).await?;
        let reply = parse_reply(&raw, self.language);

        self.transcript.push(InterviewTurn::now(
            Speaker::Ai,
            reply.question.clone(),
            reply.options.clone(),
        ));
        Ok(reply)
    }

    /// Terminal transition: ask for the consolidated prompt. Falls back to
    /// the question text when the model omits generatedPrompt.
    pub async fn finalize(&mut self) -> Result<String> {
        let closing = closing_instruction(self.language);
        let reply = self.send_turn(closing).await?;
        Ok(reply.generated_prompt.unwrap_or(reply.question))
    }

    async fn exchange(&mut self, user_text: &str) -> Result<String> {
        match self.backend.as_mut().expect("session started above") {
            Backend::Structured { key, system } => {
                let request = ProviderRequest::SessionTurn {
                    key: key.clone(),
                    system: system.clone(),
                    text: user_text.to_string(),
                    options: GenerationOptions::json_schema(prompts::response_schema()),
                };
                self.services.invoke_feature(Feature::Interview, request).await
            }
            Backend::Local { messages } => {
                messages.push(ChatMessage::new(Role::User, user_text));
                let request = ProviderRequest::Conversation {
                    messages: messages.clone(),
                    options: GenerationOptions::json(),
                };
                let raw = self.services.invoke_feature(Feature::Interview, request).await?;
                messages.push(ChatMessage::new(Role::Assistant, raw.clone()));
                Ok(raw)
            }
        }
    }
}

/// Lenient reply extraction: strip fences, parse JSON, coerce field types,
/// cap options at three. Anything unreadable becomes the sentinel reply.
fn parse_reply(raw: &str, language: Language) -> InterviewReply {
    let cleaned = strip_code_fences(raw);

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "interview reply was not valid JSON, substituting sentinel");
            return sentinel(language);
        }
    };
    let Some(obj) = value.as_object() else {
        warn!("interview reply was not a JSON object, substituting sentinel");
        return sentinel(language);
    };

    let question = obj
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let options: Vec<String> = obj
        .get("options")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .take(3)
                .collect()
        })
        .unwrap_or_default();

    let is_final_draft = obj
        .get("isFinalDraft")
        .map(|v| match v {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        })
        .unwrap_or(false);

    let generated_prompt = obj
        .get("generatedPrompt")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    InterviewReply {
        question,
        options,
        is_final_draft,
        generated_prompt,
    }
}

fn sentinel(language: Language) -> InterviewReply {
    InterviewReply {
        question: parse_failure_question(language).to_string(),
        options: Vec::new(),
        is_final_draft: false,
        generated_prompt: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_fenced_agree() {
        let plain = r#"{"question":"What tone?","options":["Friendly","Formal","Neutral"],"isFinalDraft":false}"#;
        let fenced = format!("```json\n{plain}\n```");

        let a = parse_reply(plain, Language::English);
        let b = parse_reply(&fenced, Language::English);
        assert_eq!(a, b);
        assert_eq!(a.question, "What tone?");
        assert_eq!(a.options.len(), 3);
        assert!(!a.is_final_draft);
    }

    #[test]
    fn test_unparsable_reply_becomes_sentinel() {
        let reply = parse_reply("I think we should talk about tone", Language::French);
        assert_eq!(reply.question, parse_failure_question(Language::French));
        assert!(reply.options.is_empty());
        assert!(!reply.is_final_draft);
        assert!(reply.generated_prompt.is_none());
    }

    #[test]
    fn test_options_capped_at_three() {
        let raw = r#"{"question":"q","options":["a","b","c","d","e"],"isFinalDraft":false}"#;
        let reply = parse_reply(raw, Language::English);
        assert_eq!(reply.options, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_final_draft_coercion() {
        let raw = r#"{"question":"q","options":[],"isFinalDraft":"true","generatedPrompt":"You are a bot."}"#;
        let reply = parse_reply(raw, Language::English);
        assert!(reply.is_final_draft);
        assert_eq!(reply.generated_prompt.as_deref(), Some("You are a bot."));

        let raw = r#"{"question":"q","options":[],"isFinalDraft":0}"#;
        assert!(!parse_reply(raw, Language::English).is_final_draft);
    }

    #[test]
    fn test_empty_generated_prompt_treated_as_absent() {
        let raw = r#"{"question":"q","options":[],"isFinalDraft":true,"generatedPrompt":""}"#;
        let reply = parse_reply(raw, Language::English);
        assert!(reply.generated_prompt.is_none());
    }
}
