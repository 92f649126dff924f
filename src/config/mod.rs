// src/config/mod.rs
// Settings aggregate: provider keys, feature routing, model catalog.
// The core never mutates a snapshot in place; edits replace the whole value.

pub mod storage;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Backend families the provider adapter can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Structured-output provider with provider-held chat sessions.
    GeminiLike,
    /// Generic HTTP chat-completions backend; caller supplies full history.
    OpenAiCompatible,
}

impl ProviderKind {
    /// Model-name prefix heuristic for configs created without an explicit
    /// provider (custom model entry in the CLI).
    pub fn infer(model_name: &str) -> ProviderKind {
        let name = model_name.to_lowercase();
        if name.starts_with("gemini") || name.starts_with("models/gemini") {
            ProviderKind::GeminiLike
        } else {
            ProviderKind::OpenAiCompatible
        }
    }
}

/// Logical capabilities, each routed independently to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Interview,
    Mentor,
    Feedback,
    Critique,
    Classify,
    Rewrite,
    ReverseEngineer,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Interview,
        Feature::Mentor,
        Feature::Feedback,
        Feature::Critique,
        Feature::Classify,
        Feature::Rewrite,
        Feature::ReverseEngineer,
    ];
}

/// Interview languages. System instructions are language-specific, so a
/// language change tears the session down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
    German,
    French,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::German => "German",
            Language::French => "French",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// One invocable backend configuration. Immutable once created; replaced
/// wholesale on edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub display_name: String,
    pub provider: ProviderKind,
    pub model_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ModelConfig {
    /// Built-in Gemini Flash entry (default workhorse).
    pub fn gemini_flash() -> Self {
        Self {
            id: "gemini-flash".into(),
            display_name: "Gemini 2.5 Flash".into(),
            provider: ProviderKind::GeminiLike,
            model_name: "gemini-2.5-flash".into(),
            base_url: None,
            api_key: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Built-in Gemini Pro entry (heavier rewriting work).
    pub fn gemini_pro() -> Self {
        Self {
            id: "gemini-pro".into(),
            display_name: "Gemini 2.5 Pro".into(),
            provider: ProviderKind::GeminiLike,
            model_name: "gemini-2.5-pro".into(),
            base_url: None,
            api_key: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Capability -> ModelConfig.id mapping. Read on every AI call, mutated
/// only through settings replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRouting {
    assignments: HashMap<Feature, String>,
}

impl FeatureRouting {
    pub fn model_for(&self, feature: Feature) -> Option<&str> {
        self.assignments.get(&feature).map(String::as_str)
    }

    pub fn assign(&mut self, feature: Feature, model_id: impl Into<String>) {
        self.assignments.insert(feature, model_id.into());
    }

    /// Default routing: Flash handles the conversational features, Pro the
    /// rewriting-heavy ones.
    pub fn builtin() -> Self {
        let mut routing = FeatureRouting::default();
        for feature in Feature::ALL {
            let id = match feature {
                Feature::Critique | Feature::Rewrite | Feature::ReverseEngineer => "gemini-pro",
                _ => "gemini-flash",
            };
            routing.assign(feature, id);
        }
        routing
    }
}

/// Process-wide settings snapshot. Loaded at startup, replaced atomically
/// on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub active_provider: ProviderKind,
    #[serde(default)]
    pub provider_keys: HashMap<ProviderKind, String>,
    #[serde(default)]
    pub default_api_key: Option<String>,
    #[serde(default)]
    pub default_base_url: Option<String>,
    pub routing: FeatureRouting,
    pub models: Vec<ModelConfig>,
    /// Alternate model id used once when a reconstruction hits a quota wall.
    #[serde(default)]
    pub fast_model: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_provider: ProviderKind::GeminiLike,
            provider_keys: HashMap::new(),
            default_api_key: None,
            default_base_url: None,
            routing: FeatureRouting::builtin(),
            models: vec![ModelConfig::gemini_flash(), ModelConfig::gemini_pro()],
            fast_model: Some("gemini-flash".into()),
            language: Language::English,
            theme: Theme::System,
        }
    }
}

impl Settings {
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn provider_key(&self, kind: ProviderKind) -> Option<&str> {
        self.provider_keys.get(&kind).map(String::as_str)
    }
}
