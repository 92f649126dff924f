// src/editor/types.rs
// State carried by the editor engine: suggestions, locks, processing gate.

use serde::{Deserialize, Serialize};

/// One critique finding. `original_text` is an exact substring of the
/// document at the moment the suggestion set was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub original_text: String,
    pub suggested_text: String,
    pub reason: String,
    pub category: String,
}

/// Wire shape of a critique entry as the model returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSuggestion {
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub suggested_text: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub category: String,
}

/// Structural categories for prompt content. `Pending` marks a lock whose
/// classification has not resolved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pillar {
    Persona,
    Task,
    Context,
    Format,
    Other,
    Pending,
}

impl Pillar {
    pub fn is_pending(&self) -> bool {
        matches!(self, Pillar::Pending)
    }

    /// Case-insensitive substring match against the four pillar names;
    /// anything else resolves to Other.
    pub fn from_reply(reply: &str) -> Pillar {
        let lowered = reply.to_lowercase();
        for (needle, pillar) in [
            ("persona", Pillar::Persona),
            ("task", Pillar::Task),
            ("context", Pillar::Context),
            ("format", Pillar::Format),
        ] {
            if lowered.contains(needle) {
                return pillar;
            }
        }
        Pillar::Other
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pillar::Persona => "Persona",
            Pillar::Task => "Task",
            Pillar::Context => "Context",
            Pillar::Format => "Format",
            Pillar::Other => "Other",
            Pillar::Pending => "Pending",
        }
    }
}

/// A user-protected substring that rewriting operations must not alter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedSegment {
    pub id: String,
    pub text: String,
    pub pillar: Pillar,
}

/// Which AI-mutating operation currently holds the gate. A reconstruction
/// additionally records the byte range being rewritten (drives UI dimming).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Scan,
    ApplyFeedback,
    Reconstruct { range: Option<(usize, usize)> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessingState {
    #[default]
    Idle,
    Busy(BusyKind),
}

impl ProcessingState {
    pub fn is_busy(&self) -> bool {
        matches!(self, ProcessingState::Busy(_))
    }

    pub fn rewrite_range(&self) -> Option<(usize, usize)> {
        match self {
            ProcessingState::Busy(BusyKind::Reconstruct { range }) => *range,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pillar_matching_is_case_insensitive() {
        assert_eq!(Pillar::from_reply("PERSONA"), Pillar::Persona);
        assert_eq!(Pillar::from_reply("This is the Task pillar."), Pillar::Task);
        assert_eq!(Pillar::from_reply("context"), Pillar::Context);
        assert_eq!(Pillar::from_reply("Output Format"), Pillar::Format);
    }

    #[test]
    fn test_unmatched_reply_is_other() {
        assert_eq!(Pillar::from_reply("style"), Pillar::Other);
        assert_eq!(Pillar::from_reply(""), Pillar::Other);
    }

    #[test]
    fn test_raw_suggestion_tolerates_missing_fields() {
        let raw: RawSuggestion = serde_json::from_str(r#"{"originalText": "abc"}"#).unwrap();
        assert_eq!(raw.original_text, "abc");
        assert!(raw.suggested_text.is_empty());
    }

    #[test]
    fn test_rewrite_range_only_for_reconstruct() {
        let state = ProcessingState::Busy(BusyKind::Reconstruct { range: Some((2, 7)) });
        assert_eq!(state.rewrite_range(), Some((2, 7)));
        assert_eq!(ProcessingState::Busy(BusyKind::Scan).rewrite_range(), None);
        assert_eq!(ProcessingState::Idle.rewrite_range(), None);
    }
}
