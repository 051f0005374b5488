//! Release-note generation on top of an [`LlmProvider`].
//!
//! The orchestrator talks to [`NoteGenerator`] only; whether notes come from
//! a real model or a scripted mock is invisible to it. The generator owns the
//! empty-diff short-circuit: a commit with no meaningful changes yields the
//! sentinel note without a provider call, so "nothing to say" is a value the
//! caller branches on, never an error.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use rn_core::document;
use rn_core::types::{ChangeSet, Commit, Note};

use crate::prompts;
use crate::provider::{LlmConfig, LlmError, LlmProvider};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The provider call failed.
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    /// The provider answered but the reply carried no usable text.
    #[error("model returned an empty reply")]
    EmptyReply,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Turns commits and change sets into release-note text.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    /// Release note for one commit.
    ///
    /// Never errors on an empty change set; that case returns the sentinel
    /// [`Note::no_change`] without consulting the model.
    async fn generate(&self, commit: &Commit, changes: &ChangeSet)
        -> Result<Note, GeneratorError>;

    /// One consolidated note covering a whole commit range (manual mode).
    async fn generate_batch(&self, items: &[(Commit, ChangeSet)])
        -> Result<Note, GeneratorError>;

    /// Fold a note into the living document, returning the new document text.
    ///
    /// Inserts a timestamped entry block after the title line; existing
    /// entries are never rewritten.
    async fn update_document(
        &self,
        document: &str,
        commit: &Commit,
        changes: &ChangeSet,
        note: &Note,
    ) -> Result<String, GeneratorError>;
}

// ---------------------------------------------------------------------------
// LlmNoteGenerator
// ---------------------------------------------------------------------------

/// [`NoteGenerator`] backed by a chat-completion provider.
pub struct LlmNoteGenerator {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
}

impl LlmNoteGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    /// Trimmed reply text, mapping empty replies and the sentinel phrase.
    fn note_from_reply(reply: &str) -> Result<Note, GeneratorError> {
        let text = reply.trim();
        if text.is_empty() {
            return Err(GeneratorError::EmptyReply);
        }
        // Models occasionally echo the sentinel verbatim; treat that the
        // same as an empty diff so downstream steps are skipped.
        if text == Note::NO_CHANGE_TEXT {
            return Ok(Note::no_change());
        }
        Ok(Note::generated(text))
    }
}

#[async_trait]
impl NoteGenerator for LlmNoteGenerator {
    async fn generate(
        &self,
        commit: &Commit,
        changes: &ChangeSet,
    ) -> Result<Note, GeneratorError> {
        if !changes.is_meaningful() {
            debug!(commit = %commit.short_id(), "no meaningful changes, skipping model call");
            return Ok(Note::no_change());
        }

        let messages = prompts::release_note_messages(commit, changes);
        let response = self.provider.complete(&messages, &self.config).await?;
        Self::note_from_reply(&response.content)
    }

    async fn generate_batch(
        &self,
        items: &[(Commit, ChangeSet)],
    ) -> Result<Note, GeneratorError> {
        if items.iter().all(|(_, changes)| !changes.is_meaningful()) {
            return Ok(Note::no_change());
        }

        let messages = prompts::batch_note_messages(items);
        let response = self.provider.complete(&messages, &self.config).await?;
        Self::note_from_reply(&response.content)
    }

    async fn update_document(
        &self,
        document: &str,
        commit: &Commit,
        changes: &ChangeSet,
        note: &Note,
    ) -> Result<String, GeneratorError> {
        let entry = document::format_entry(Utc::now(), commit, &note.text, changes);
        Ok(document::insert_entry(document, &entry))
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Scripted [`NoteGenerator`] for orchestrator tests.
///
/// Mirrors the real generator's short-circuit: an empty change set returns
/// the sentinel without consuming the queue. Otherwise each `generate` call
/// pops the next queued result; an empty queue yields a deterministic
/// per-commit note.
pub struct MockGenerator {
    notes: Mutex<VecDeque<Result<Note, GeneratorError>>>,
    batch_notes: Mutex<VecDeque<Result<Note, GeneratorError>>>,
    generate_calls: Mutex<Vec<String>>,
    update_calls: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(VecDeque::new()),
            batch_notes: Mutex::new(VecDeque::new()),
            generate_calls: Mutex::new(Vec::new()),
            update_calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a note for the next `generate` call.
    pub fn with_note(self, note: Note) -> Self {
        self.notes.lock().unwrap().push_back(Ok(note));
        self
    }

    /// Queue a failure for the next `generate` call.
    pub fn with_generation_error(self, error: GeneratorError) -> Self {
        self.notes.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue a note for the next `generate_batch` call.
    pub fn with_batch_note(self, note: Note) -> Self {
        self.batch_notes.lock().unwrap().push_back(Ok(note));
        self
    }

    /// Commit ids passed to `generate`, in call order.
    pub fn generate_calls(&self) -> Vec<String> {
        self.generate_calls.lock().unwrap().clone()
    }

    /// Commit ids passed to `update_document`, in call order.
    pub fn update_calls(&self) -> Vec<String> {
        self.update_calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteGenerator for MockGenerator {
    async fn generate(
        &self,
        commit: &Commit,
        changes: &ChangeSet,
    ) -> Result<Note, GeneratorError> {
        self.generate_calls.lock().unwrap().push(commit.id.clone());

        if !changes.is_meaningful() {
            return Ok(Note::no_change());
        }

        match self.notes.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Note::generated(format!(
                "Release notes for {}",
                commit.short_id()
            ))),
        }
    }

    async fn generate_batch(
        &self,
        items: &[(Commit, ChangeSet)],
    ) -> Result<Note, GeneratorError> {
        if items.iter().all(|(_, changes)| !changes.is_meaningful()) {
            return Ok(Note::no_change());
        }

        match self.batch_notes.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Note::generated(format!(
                "Combined release notes for {} commits",
                items.len()
            ))),
        }
    }

    async fn update_document(
        &self,
        document: &str,
        commit: &Commit,
        changes: &ChangeSet,
        note: &Note,
    ) -> Result<String, GeneratorError> {
        self.update_calls.lock().unwrap().push(commit.id.clone());
        let entry = document::format_entry(Utc::now(), commit, &note.text, changes);
        Ok(document::insert_entry(document, &entry))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
