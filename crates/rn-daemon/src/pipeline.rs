//! Per-commit pipeline: change set -> note -> document -> notification.
//!
//! One commit's failure is contained here. The orchestrator logs the
//! [`PipelineError`] with its stage and keeps going; nothing in this module
//! aborts a batch.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use rn_core::document::{DocumentError, DocumentStore};
use rn_core::gate::SignificanceGate;
use rn_core::types::{Commit, Note, NoteKind};
use rn_git::{CommitSource, GitError};
use rn_llm::{GeneratorError, NoteGenerator};
use rn_notify::{PublishContext, PublishSink};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of one commit's pipeline, tagged by the stage that broke.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("change fetch failed: {0}")]
    Changes(#[from] GitError),
    #[error("document update failed: {0}")]
    Document(#[from] DocumentError),
    #[error("document rendering failed: {0}")]
    Render(#[from] GeneratorError),
}

impl PipelineError {
    /// Stage label for log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Changes(_) => "changes",
            PipelineError::Document(_) => "document",
            PipelineError::Render(_) => "render",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What one commit's pipeline run produced.
#[derive(Debug)]
pub struct CommitOutcome {
    pub note: Note,
    pub document_updated: bool,
    pub published: bool,
}

impl CommitOutcome {
    /// Placeholder notes mean generation failed; those commits count as
    /// failed for batch accounting and the hold-on-failure cursor policy.
    pub fn succeeded(&self) -> bool {
        self.note.kind != NoteKind::Fallback
    }
}

// ---------------------------------------------------------------------------
// CommitPipeline
// ---------------------------------------------------------------------------

/// Stateless processor for single commits. Holds the collaborators; the
/// orchestrator drives it once per commit in batch order.
pub struct CommitPipeline {
    source: Arc<dyn CommitSource>,
    generator: Arc<dyn NoteGenerator>,
    sink: Option<Arc<dyn PublishSink>>,
    gate: Arc<dyn SignificanceGate>,
    document: DocumentStore,
}

impl CommitPipeline {
    pub fn new(
        source: Arc<dyn CommitSource>,
        generator: Arc<dyn NoteGenerator>,
        sink: Option<Arc<dyn PublishSink>>,
        gate: Arc<dyn SignificanceGate>,
        document: DocumentStore,
    ) -> Self {
        Self {
            source,
            generator,
            sink,
            gate,
            document,
        }
    }

    /// Run the full pipeline for one commit.
    ///
    /// A generation failure is absorbed into a placeholder note, which is
    /// still published but never folded into the document. The sentinel
    /// "no meaningful changes" note skips both document and notification.
    pub async fn process(&self, commit: &Commit) -> Result<CommitOutcome, PipelineError> {
        let changes = self.source.changes(&commit.id).await?;

        let note = match self.generator.generate(commit, &changes).await {
            Ok(note) => note,
            Err(e) => {
                warn!(
                    commit = %commit.short_id(),
                    error = %e,
                    "note generation failed, recording placeholder"
                );
                Note::fallback(commit.short_id(), e)
            }
        };

        if note.is_no_change() {
            debug!(
                commit = %commit.short_id(),
                "no meaningful changes, skipping document and notification"
            );
            return Ok(CommitOutcome {
                note,
                document_updated: false,
                published: false,
            });
        }

        let mut document_updated = false;
        if note.is_generated() && self.gate.should_update(&commit.message, &changes) {
            let snapshot = self.document.read()?;
            let updated = self
                .generator
                .update_document(&snapshot.text, commit, &changes, &note)
                .await?;
            self.document.write(&snapshot, &updated)?;
            document_updated = true;
            info!(
                commit = %commit.short_id(),
                path = %self.document.path().display(),
                "document updated"
            );
        }

        let mut published = false;
        if let Some(sink) = &self.sink {
            match sink.publish(&note, &PublishContext::commit(commit)).await {
                Ok(()) => published = true,
                Err(e) => {
                    // Delivery is best-effort; a dead webhook never blocks
                    // commit processing or cursor advancement.
                    warn!(
                        commit = %commit.short_id(),
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
        }

        Ok(CommitOutcome {
            note,
            document_updated,
            published,
        })
    }
}
