//! Editor orchestration engine.
//!
//! Owns the prompt document and every piece of derived state: critique
//! suggestions, locked segments, the mentor tip, the single undo slot, and
//! the processing gate that keeps AI-mutating operations from overlapping.
//! All AI operations read a snapshot of the document and write back a full
//! replacement; a failed operation simply does not apply its result.

mod prompts;
mod types;

pub use types::{BusyKind, LockedSegment, Pillar, ProcessingState, Suggestion};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Feature;
use crate::error::{Error, Result};
use crate::llm::{strip_code_fences, GenerationOptions, PromptServices, ProviderRequest};
use types::RawSuggestion;

/// Quiet period after the last edit before mentor feedback fires.
pub const MENTOR_QUIESCENCE: Duration = Duration::from_millis(2500);

/// Documents shorter than this get no mentor feedback.
pub const MENTOR_MIN_DOC_LEN: usize = 20;

pub struct EditorEngine {
    services: Arc<PromptServices>,
    document: String,
    context: String,
    suggestions: Vec<Suggestion>,
    locks: Vec<LockedSegment>,
    mentor_tip: Option<String>,
    ignored_tips: Vec<String>,
    undo_slot: Option<String>,
    processing: ProcessingState,
    /// Document value at the time of the last mentor request; blocks
    /// duplicate requests for an unchanged document.
    last_mentor_doc: Option<String>,
    last_edit: Instant,
}

impl EditorEngine {
    pub fn new(services: Arc<PromptServices>, document: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            services,
            document: document.into(),
            context: context.into(),
            suggestions: Vec::new(),
            locks: Vec::new(),
            mentor_tip: None,
            ignored_tips: Vec::new(),
            undo_slot: None,
            processing: ProcessingState::Idle,
            last_mentor_doc: None,
            last_edit: Instant::now(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn locks(&self) -> &[LockedSegment] {
        &self.locks
    }

    pub fn mentor_tip(&self) -> Option<&str> {
        self.mentor_tip.as_deref()
    }

    pub fn processing(&self) -> ProcessingState {
        self.processing
    }

    pub fn can_undo(&self) -> bool {
        self.undo_slot.is_some()
    }

    // ------------------------------------------------------------------
    // Document edits
    // ------------------------------------------------------------------

    /// Manual edit: replaces the document, drops the undo snapshot, and
    /// starts a fresh mentor cycle (ignored-tip history included).
    pub fn set_document(&mut self, text: impl Into<String>) {
        self.document = text.into();
        self.undo_slot = None;
        self.ignored_tips.clear();
        self.last_edit = Instant::now();
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// AI-driven replacement; the undo slot is managed by the caller.
    fn replace_document(&mut self, text: String) {
        self.document = text;
        self.last_edit = Instant::now();
    }

    fn begin(&mut self, kind: BusyKind) -> Result<()> {
        if self.processing.is_busy() {
            return Err(Error::Busy);
        }
        self.processing = ProcessingState::Busy(kind);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deep scan (critique)
    // ------------------------------------------------------------------

    /// Run a critique pass and replace the suggestion set. Entries whose
    /// quoted text no longer appears in the document are silently dropped;
    /// unreadable output yields an empty set.
    pub async fn deep_scan(&mut self) -> Result<usize> {
        self.begin(BusyKind::Scan)?;
        let result = self.deep_scan_inner().await;
        self.processing = ProcessingState::Idle;
        result
    }

    async fn deep_scan_inner(&mut self) -> Result<usize> {
        let prompt = prompts::critique(&self.document, &self.context);
        let raw = self
            .services
            .invoke_feature(
                Feature::Critique,
                ProviderRequest::Prompt {
                    system: None,
                    prompt,
                    options: GenerationOptions::json(),
                },
            )
            .await?;

        let parsed: Vec<RawSuggestion> = match serde_json::from_str(&strip_code_fences(&raw)) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "critique output unreadable, clearing suggestions");
                self.suggestions.clear();
                return Ok(0);
            }
        };

        let total = parsed.len();
        self.suggestions = parsed
            .into_iter()
            .filter(|s| !s.original_text.is_empty() && self.document.contains(&s.original_text))
            .map(|s| Suggestion {
                id: Uuid::new_v4().to_string(),
                original_text: s.original_text,
                suggested_text: s.suggested_text,
                reason: s.reason,
                category: s.category,
            })
            .collect();

        if self.suggestions.len() < total {
            debug!(
                dropped = total - self.suggestions.len(),
                "dropped suggestions no longer anchored in the document"
            );
        }
        Ok(self.suggestions.len())
    }

    /// Replace exactly the suggestion's quoted span and consume it. A stale
    /// suggestion (text no longer present) is consumed without an edit.
    pub fn apply_suggestion(&mut self, id: &str) -> bool {
        let Some(idx) = self.suggestions.iter().position(|s| s.id == id) else {
            return false;
        };
        let suggestion = self.suggestions.remove(idx);

        if !self.document.contains(&suggestion.original_text) {
            return false;
        }
        let updated = self
            .document
            .replacen(&suggestion.original_text, &suggestion.suggested_text, 1);
        // A user-driven edit: same cycle semantics as typing.
        self.set_document(updated);
        true
    }

    pub fn dismiss_suggestion(&mut self, id: &str) -> bool {
        let before = self.suggestions.len();
        self.suggestions.retain(|s| s.id != id);
        self.suggestions.len() < before
    }

    // ------------------------------------------------------------------
    // Mentor feedback loop
    // ------------------------------------------------------------------

    /// One tick of the mentor loop. Fires only when every gate passes: no
    /// operation in flight, the document changed since the last request,
    /// the document is long enough, and the quiescence delay elapsed.
    /// Returns whether a request was made.
    pub async fn poll_mentor(&mut self) -> Result<bool> {
        if self.processing.is_busy() {
            return Ok(false);
        }
        if self.document.len() < MENTOR_MIN_DOC_LEN {
            return Ok(false);
        }
        if self.last_mentor_doc.as_deref() == Some(self.document.as_str()) {
            return Ok(false);
        }
        if self.last_edit.elapsed() < MENTOR_QUIESCENCE {
            return Ok(false);
        }

        self.request_mentor_tip().await?;
        Ok(true)
    }

    /// Push the current tip into the ignored history and drop it. Follow up
    /// with [`regenerate_mentor_tip`] to request a replacement.
    pub fn dismiss_mentor_tip(&mut self) {
        if let Some(tip) = self.mentor_tip.take() {
            self.ignored_tips.push(tip);
        }
    }

    /// Request a fresh tip immediately, carrying the dismissed history as
    /// negative constraints. A successful regeneration resets that history.
    pub async fn regenerate_mentor_tip(&mut self) -> Result<()> {
        self.request_mentor_tip().await?;
        if self.mentor_tip.is_some() {
            self.ignored_tips.clear();
        }
        Ok(())
    }

    async fn request_mentor_tip(&mut self) -> Result<()> {
        // Marked before the await so overlapping ticks skip this document.
        self.last_mentor_doc = Some(self.document.clone());

        let prompt = prompts::mentor(&self.document, &self.context, &self.ignored_tips);
        let request = ProviderRequest::Prompt {
            system: None,
            prompt,
            options: GenerationOptions::default(),
        };

        match self.services.invoke_feature(Feature::Mentor, request).await {
            Ok(raw) => {
                let tip = raw.trim();
                self.mentor_tip = (!tip.is_empty()).then(|| tip.to_string());
                Ok(())
            }
            Err(Error::Configuration(msg)) => Err(Error::Configuration(msg)),
            Err(e) => {
                warn!(error = %e, "mentor request failed, clearing tip");
                self.mentor_tip = None;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Apply feedback + undo
    // ------------------------------------------------------------------

    /// Apply the current mentor tip with the minimum edit, preserving every
    /// locked segment verbatim. Snapshots the document into the single undo
    /// slot first. Returns whether anything was applied.
    pub async fn apply_mentor_tip(&mut self) -> Result<bool> {
        let Some(tip) = self.mentor_tip.clone() else {
            return Ok(false);
        };
        self.begin(BusyKind::ApplyFeedback)?;
        let result = self.apply_mentor_tip_inner(&tip).await;
        self.processing = ProcessingState::Idle;
        result.map(|_| true)
    }

    async fn apply_mentor_tip_inner(&mut self, tip: &str) -> Result<()> {
        self.undo_slot = Some(self.document.clone());

        let prompt = prompts::apply_tip(&self.document, tip, &self.locks);
        let raw = self
            .services
            .invoke_feature(
                Feature::Feedback,
                ProviderRequest::Prompt {
                    system: None,
                    prompt,
                    options: GenerationOptions::default(),
                },
            )
            .await?;

        self.replace_document(raw.trim().to_string());
        self.suggestions.clear();
        self.mentor_tip = None;
        Ok(())
    }

    /// Restore the snapshot taken by the last apply, once. A second call
    /// without a new apply is a no-op.
    pub fn undo(&mut self) -> bool {
        match self.undo_slot.take() {
            Some(previous) => {
                self.document = previous;
                self.last_edit = Instant::now();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Reconstruction
    // ------------------------------------------------------------------

    /// Rewrite the whole document guided strictly by the context. On a
    /// quota failure the configured fast model is tried once; with none
    /// configured the document is left unchanged.
    pub async fn reconstruct_full(&mut self) -> Result<()> {
        self.begin(BusyKind::Reconstruct { range: None })?;
        let result = self.reconstruct_full_inner().await;
        self.processing = ProcessingState::Idle;
        result
    }

    async fn reconstruct_full_inner(&mut self) -> Result<()> {
        let prompt = prompts::rewrite_full(&self.document, &self.context, &self.locks);
        let request = ProviderRequest::Prompt {
            system: None,
            prompt,
            options: GenerationOptions::default(),
        };

        match self.services.invoke_feature(Feature::Rewrite, request.clone()).await {
            Ok(raw) => {
                self.replace_document(raw.trim().to_string());
                Ok(())
            }
            Err(e) if e.is_rate_limited() => {
                let fast_model = self.services.settings().fast_model;
                match fast_model {
                    Some(model_id) => {
                        warn!(model = %model_id, "rewrite hit quota, falling back to fast model");
                        match self.services.invoke_model(&model_id, request).await {
                            Ok(raw) => {
                                self.replace_document(raw.trim().to_string());
                                Ok(())
                            }
                            Err(e) => {
                                warn!(error = %e, "fast-model fallback failed, document unchanged");
                                Ok(())
                            }
                        }
                    }
                    None => {
                        warn!("rewrite hit quota and no fast model configured, document unchanged");
                        Ok(())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrite only the selected byte range and splice the reply back at
    /// the original offsets. The reply is accepted as-is; the instruction
    /// forbids conversational filler but nothing strips it.
    pub async fn reconstruct_partial(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end || end > self.document.len() {
            return Err(Error::Selection(format!(
                "range {start}..{end} outside document of length {}",
                self.document.len()
            )));
        }
        if !self.document.is_char_boundary(start) || !self.document.is_char_boundary(end) {
            return Err(Error::Selection(format!(
                "range {start}..{end} does not fall on character boundaries"
            )));
        }

        self.begin(BusyKind::Reconstruct {
            range: Some((start, end)),
        })?;
        let result = self.reconstruct_partial_inner(start, end).await;
        self.processing = ProcessingState::Idle;
        result
    }

    async fn reconstruct_partial_inner(&mut self, start: usize, end: usize) -> Result<()> {
        let selection = self.document[start..end].to_string();
        let prompt = prompts::rewrite_partial(&selection, &self.document, &self.locks);

        let replacement = self
            .services
            .invoke_feature(
                Feature::Rewrite,
                ProviderRequest::Prompt {
                    system: None,
                    prompt,
                    options: GenerationOptions::default(),
                },
            )
            .await?;

        let mut updated = String::with_capacity(self.document.len() + replacement.len());
        updated.push_str(&self.document[..start]);
        updated.push_str(&replacement);
        updated.push_str(&self.document[end..]);
        self.replace_document(updated);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Locked segments
    // ------------------------------------------------------------------

    /// Lock a selection. The text must appear in the document and be unique
    /// among active locks; classification starts out Pending.
    pub fn add_lock(&mut self, text: impl Into<String>) -> Result<String> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Selection("cannot lock an empty selection".into()));
        }
        if !self.document.contains(&text) {
            return Err(Error::Selection(
                "locked text must appear in the document".into(),
            ));
        }
        if self.locks.iter().any(|l| l.text == text) {
            return Err(Error::Selection("this segment is already locked".into()));
        }

        let id = Uuid::new_v4().to_string();
        self.locks.push(LockedSegment {
            id: id.clone(),
            text,
            pillar: Pillar::Pending,
        });
        Ok(id)
    }

    pub fn remove_lock(&mut self, id: &str) -> bool {
        let before = self.locks.len();
        self.locks.retain(|l| l.id != id);
        self.locks.len() < before
    }

    /// Resolve every Pending lock to a pillar, one classification per
    /// segment. Errors and unmatched replies resolve to Other. Write-back
    /// is by id, so removal of other segments during the round-trips is
    /// safe. Returns the number of segments resolved.
    pub async fn classify_pending_locks(&mut self) -> Result<usize> {
        let pending: Vec<(String, String)> = self
            .locks
            .iter()
            .filter(|l| l.pillar.is_pending())
            .map(|l| (l.id.clone(), l.text.clone()))
            .collect();

        let mut resolved = 0;
        for (id, text) in pending {
            let request = ProviderRequest::Prompt {
                system: None,
                prompt: prompts::classify(&text),
                options: GenerationOptions::default(),
            };

            let pillar = match self.services.invoke_feature(Feature::Classify, request).await {
                Ok(reply) => Pillar::from_reply(&reply),
                Err(e) => {
                    warn!(error = %e, "lock classification failed, resolving to Other");
                    Pillar::Other
                }
            };

            if let Some(lock) = self
                .locks
                .iter_mut()
                .find(|l| l.id == id && l.pillar.is_pending())
            {
                lock.pillar = pillar;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Reverse engineering
    // ------------------------------------------------------------------

    /// Derive a prompt that would plausibly produce the given example
    /// output. Does not touch the document; the caller decides adoption.
    pub async fn reverse_engineer(&self, example: &str) -> Result<String> {
        let raw = self
            .services
            .invoke_feature(
                Feature::ReverseEngineer,
                ProviderRequest::Prompt {
                    system: None,
                    prompt: prompts::reverse_engineer(example),
                    options: GenerationOptions::default(),
                },
            )
            .await?;
        Ok(raw.trim().to_string())
    }
}
