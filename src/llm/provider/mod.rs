//! Provider abstraction for chat-completion backends.
//!
//! Two backend families sit behind one trait: a structured-output provider
//! with provider-held sessions (Gemini-like) and a stateless
//! OpenAI-compatible chat-completions endpoint. The adapters normalize both
//! into a single request/response shape; branching on provider kind happens
//! once, in the service layer, never per call site.

mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{Language, ProviderKind};
use crate::error::Result;

/// Unified provider trait for LLM backends.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    /// Execute one request against `model` and return the raw response text.
    /// Errors propagate unchanged to the retry policy.
    async fn invoke(&self, model: &str, request: ProviderRequest) -> Result<String>;

    /// Drop any provider-held session state for `key`. No-op for stateless
    /// backends.
    fn reset_session(&self, _key: &SessionKey) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Response shape the caller expects back.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// JSON mode: the backend is asked for a JSON body, no schema attached.
    Json,
    /// Constrained output against an explicit JSON schema.
    JsonSchema(Value),
}

impl ResponseFormat {
    pub fn wants_json(&self) -> bool {
        !matches!(self, ResponseFormat::Text)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub format: ResponseFormat,
}

impl GenerationOptions {
    pub fn json() -> Self {
        Self {
            format: ResponseFormat::Json,
            ..Default::default()
        }
    }

    pub fn json_schema(schema: Value) -> Self {
        Self {
            format: ResponseFormat::JsonSchema(schema),
            ..Default::default()
        }
    }
}

/// Identifies one provider-held chat session. System instructions are
/// language-specific, so the language is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub model: String,
    pub language: Language,
}

impl SessionKey {
    pub fn new(model: impl Into<String>, language: Language) -> Self {
        Self {
            model: model.into(),
            language,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    /// One-shot call with an optional system instruction.
    Prompt {
        system: Option<String>,
        prompt: String,
        options: GenerationOptions,
    },
    /// Caller-supplied full history (stateless backends).
    Conversation {
        messages: Vec<ChatMessage>,
        options: GenerationOptions,
    },
    /// Turn appended to a provider-held session. The system instruction is
    /// only applied when the session is first created.
    SessionTurn {
        key: SessionKey,
        system: String,
        text: String,
        options: GenerationOptions,
    },
}

impl ProviderRequest {
    pub fn options(&self) -> &GenerationOptions {
        match self {
            ProviderRequest::Prompt { options, .. }
            | ProviderRequest::Conversation { options, .. }
            | ProviderRequest::SessionTurn { options, .. } => options,
        }
    }

    pub fn options_mut(&mut self) -> &mut GenerationOptions {
        match self {
            ProviderRequest::Prompt { options, .. }
            | ProviderRequest::Conversation { options, .. }
            | ProviderRequest::SessionTurn { options, .. } => options,
        }
    }
}

/// Strip a markdown code fence wrapping a JSON body. Backends in JSON mode
/// still occasionally answer with ```json ... ``` around the payload.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    // Drop the opening fence line (``` or ```json), then the closing fence.
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.to_string(),
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_json() {
        let fenced = "```json\n{\"question\": \"What tone?\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"question\": \"What tone?\"}");
    }

    #[test]
    fn test_strip_fence_without_language_tag() {
        let fenced = "```\n[1, 2, 3]\n```";
        assert_eq!(strip_code_fences(fenced), "[1, 2, 3]");
    }

    #[test]
    fn test_unfenced_text_passes_through() {
        assert_eq!(strip_code_fences("  {\"a\": 1} \n"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("plain answer"), "plain answer");
    }

    #[test]
    fn test_fence_marker_without_newline_is_left_alone() {
        assert_eq!(strip_code_fences("```json"), "```json");
    }

    #[test]
    fn test_options_accessor_covers_all_variants() {
        let mut req = ProviderRequest::Prompt {
            system: None,
            prompt: "hi".into(),
            options: GenerationOptions::json(),
        };
        assert!(req.options().format.wants_json());
        req.options_mut().temperature = Some(0.2);
        assert_eq!(req.options().temperature, Some(0.2));
    }
}
