// src/export.rs
// Export collaborators at the boundary: Markdown rendering, a versioned
// JSON envelope, and the base64 payload embedded in share links. The core
// only supplies the prompt and context strings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub prompt: String,
    pub context: String,
}

/// URL-embeddable share payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SharePayload {
    p: String,
    c: String,
}

pub fn to_markdown(prompt: &str, context: &str) -> String {
    let mut out = String::from("# Prompt\n\n");
    out.push_str(prompt.trim_end());
    out.push('\n');
    if !context.trim().is_empty() {
        out.push_str("\n## Context\n\n");
        out.push_str(context.trim_end());
        out.push('\n');
    }
    out
}

pub fn to_json(prompt: &str, context: &str) -> Result<String> {
    let envelope = ExportEnvelope {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        prompt: prompt.to_string(),
        context: context.to_string(),
    };
    serde_json::to_string_pretty(&envelope).map_err(|e| Error::Storage(e.to_string()))
}

/// Base64 payload for share links: `{p: prompt, c: context}`.
pub fn share_payload(prompt: &str, context: &str) -> String {
    let payload = SharePayload {
        p: prompt.to_string(),
        c: context.to_string(),
    };
    let blob = serde_json::to_vec(&payload).expect("string-only payload serializes");
    URL_SAFE_NO_PAD.encode(blob)
}

/// Decode a share payload back into (prompt, context).
pub fn decode_share_payload(encoded: &str) -> Result<(String, String)> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|e| Error::Parse(format!("share payload is not valid base64: {e}")))?;
    let payload: SharePayload = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Parse(format!("share payload is not valid JSON: {e}")))?;
    Ok((payload.p, payload.c))
}
