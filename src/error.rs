//! Typed error taxonomy for the crate.
//!
//! Mirrors the propagation policy in the spec: `Configuration` errors are
//! fatal to the triggering operation, `Provider` errors are retried by the
//! retry layer when rate-limit-shaped, `Parse` errors never cross the public
//! API boundary (each call site substitutes a fallback). `Busy`, `Selection`,
//! and `Storage` cover the editor and persistence layers.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The typed error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or inconsistent configuration (no key, unknown model, dangling
    /// routing). Fatal to the triggering operation; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An HTTP/provider-level failure. Retried by the retry layer when
    /// rate-limit-shaped, otherwise surfaced to the caller.
    #[error("provider error{}: {message}", match status { Some(s) => format!(" (status {s})"), None => String::new() })]
    Provider {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// Malformed structured data from a provider. Never thrown across the
    /// public API boundary — call sites substitute a safe fallback.
    #[error("parse error: {0}")]
    Parse(String),

    /// An edit was requested while another AI operation was already in flight.
    #[error("an AI operation is already in progress")]
    Busy,

    /// An invalid selection/segment operation in the editor.
    #[error("selection error: {0}")]
    Selection(String),

    /// A settings-storage read/write failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Construct a [`Error::Provider`].
    pub fn provider(
        status: Option<u16>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Provider {
            status,
            code,
            message: message.into(),
        }
    }

    /// Classify whether this error is rate-limit shaped and therefore
    /// retryable. Checks HTTP status 429, then a `RESOURCE_EXHAUSTED`/429
    /// provider code, then a "429"/"quota" message substring — in that order.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::Provider {
                status,
                code,
                message,
            } => {
                if *status == Some(429) {
                    return true;
                }
                if let Some(code) = code {
                    if code == "RESOURCE_EXHAUSTED" || code.contains("429") {
                        return true;
                    }
                }
                message.contains("429") || message.contains("quota")
            }
            _ => false,
        }
    }
}
