//! Feature-model routing.
//!
//! Pure function of the settings snapshot: a logical capability maps to a
//! configured model plus the effective API key and base URL. Cached client
//! handles are invalidated by the service layer whenever the snapshot is
//! replaced.

use crate::config::{Feature, ModelConfig, Settings};
use crate::error::{Error, Result};

/// Fully-resolved invocation target for one feature call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub config: ModelConfig,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Resolve `feature` against the current snapshot. Fails with a
/// configuration error when the routing entry is missing or points at a
/// deleted/renamed model.
pub fn resolve(feature: Feature, settings: &Settings) -> Result<ResolvedModel> {
    let id = settings
        .routing
        .model_for(feature)
        .ok_or_else(|| Error::Configuration(format!("no model assigned to {feature:?}")))?;

    let config = settings
        .model(id)
        .cloned()
        .ok_or_else(|| Error::Configuration(format!("model '{id}' for {feature:?} does not exist")))?;

    resolve_config(config, settings)
}

/// Resolve a model by id directly (fast-model fallback path).
pub fn resolve_model_id(id: &str, settings: &Settings) -> Result<ResolvedModel> {
    let config = settings
        .model(id)
        .cloned()
        .ok_or_else(|| Error::Configuration(format!("model '{id}' does not exist")))?;
    resolve_config(config, settings)
}

fn resolve_config(config: ModelConfig, settings: &Settings) -> Result<ResolvedModel> {
    // Key precedence: model-specific > global default > provider-level.
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| settings.default_api_key.clone().filter(|k| !k.is_empty()))
        .or_else(|| {
            settings
                .provider_key(config.provider)
                .filter(|k| !k.is_empty())
                .map(String::from)
        })
        .ok_or_else(|| {
            Error::Configuration(format!("no API key available for model '{}'", config.id))
        })?;

    // Base URL precedence: model-specific > global default > fixed endpoint.
    let base_url = config
        .base_url
        .clone()
        .or_else(|| settings.default_base_url.clone());

    Ok(ResolvedModel {
        config,
        api_key,
        base_url,
    })
}
