//! LLM service layer.
//!
//! `PromptServices` owns the settings snapshot and the cached provider
//! handles. Every feature call funnels through here: route the feature to a
//! model, fill generation defaults from the model config, then run the
//! provider call inside the retry policy. Settings updates replace the
//! snapshot wholesale and drop every cached handle.

pub mod provider;
pub mod retry;
pub mod router;

pub use provider::{
    ChatMessage, GenerationOptions, Provider, ProviderRequest, ResponseFormat, Role, SessionKey,
    strip_code_fences,
};
pub use router::ResolvedModel;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::config::{Feature, ProviderKind, Settings};
use crate::error::Result;
use provider::{GeminiProvider, OpenAiProvider};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandleKey {
    kind: ProviderKind,
    api_key: String,
    base_url: Option<String>,
}

pub struct PromptServices {
    settings: RwLock<Settings>,
    handles: Mutex<HashMap<HandleKey, Arc<dyn Provider>>>,
    /// Test seam: when set, every resolution yields this handle.
    override_provider: Option<Arc<dyn Provider>>,
}

impl PromptServices {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            handles: Mutex::new(HashMap::new()),
            override_provider: None,
        }
    }

    /// Construct with a fixed provider handle instead of real backends.
    /// Routing, key resolution, and retry behave exactly as in production.
    pub fn with_provider(settings: Settings, provider: Arc<dyn Provider>) -> Self {
        Self {
            settings: RwLock::new(settings),
            handles: Mutex::new(HashMap::new()),
            override_provider: Some(provider),
        }
    }

    /// Full snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().expect("settings lock poisoned").clone()
    }

    /// Replace the settings wholesale and invalidate every cached handle.
    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write().expect("settings lock poisoned") = settings;
        self.handles.lock().expect("handle cache poisoned").clear();
        debug!("settings replaced, provider handles invalidated");
    }

    pub fn resolve(&self, feature: Feature) -> Result<ResolvedModel> {
        router::resolve(feature, &self.settings())
    }

    /// Route `feature` and execute the request through the retry chokepoint.
    pub async fn invoke_feature(&self, feature: Feature, request: ProviderRequest) -> Result<String> {
        let resolved = self.resolve(feature)?;
        self.invoke_resolved(&resolved, request).await
    }

    /// Invoke a specific model id, bypassing feature routing (the
    /// reconstruction fast-model fallback).
    pub async fn invoke_model(&self, model_id: &str, request: ProviderRequest) -> Result<String> {
        let resolved = router::resolve_model_id(model_id, &self.settings())?;
        self.invoke_resolved(&resolved, request).await
    }

    /// Drop provider-held session state for the feature's backend.
    pub fn reset_session(&self, feature: Feature, key: &SessionKey) -> Result<()> {
        let resolved = self.resolve(feature)?;
        self.handle_for(&resolved).reset_session(key);
        Ok(())
    }

    async fn invoke_resolved(&self, resolved: &ResolvedModel, mut request: ProviderRequest) -> Result<String> {
        // Model-config generation defaults apply when the caller left them
        // unset.
        {
            let options = request.options_mut();
            if options.temperature.is_none() {
                options.temperature = resolved.config.temperature;
            }
            if options.max_tokens.is_none() {
                options.max_tokens = resolved.config.max_tokens;
            }
        }

        let handle = self.handle_for(resolved);
        let model = resolved.config.model_name.clone();
        debug!(model = %model, provider = handle.name(), "dispatching provider call");

        retry::with_retry(|| {
            let request = request.clone();
            let handle = Arc::clone(&handle);
            let model = model.clone();
            async move { handle.invoke(&model, request).await }
        })
        .await
    }

    fn handle_for(&self, resolved: &ResolvedModel) -> Arc<dyn Provider> {
        if let Some(provider) = &self.override_provider {
            return Arc::clone(provider);
        }

        let key = HandleKey {
            kind: resolved.config.provider,
            api_key: resolved.api_key.clone(),
            base_url: resolved.base_url.clone(),
        };

        let mut handles = self.handles.lock().expect("handle cache poisoned");
        Arc::clone(handles.entry(key).or_insert_with(|| match resolved.config.provider {
            ProviderKind::GeminiLike => Arc::new(GeminiProvider::new(
                resolved.api_key.clone(),
                resolved.base_url.clone(),
            )),
            ProviderKind::OpenAiCompatible => Arc::new(OpenAiProvider::new(
                resolved.api_key.clone(),
                resolved.base_url.clone(),
            )),
        }))
    }
}
