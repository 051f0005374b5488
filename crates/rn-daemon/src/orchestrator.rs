//! Continuous-mode orchestrator.
//!
//! Pulls commits newer than the progress cursor, runs each through the
//! per-commit pipeline, and advances the cursor once per batch. The loop
//! survives anything short of unusable progress state at startup.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rn_core::config::{CursorPolicy, MonitorConfig};
use rn_core::cursor::{CursorError, CursorStore};
use rn_core::document::DocumentStore;
use rn_core::gate::SignificanceGate;
use rn_git::{CommitSource, GitError};
use rn_llm::NoteGenerator;
use rn_notify::PublishSink;

use crate::pipeline::CommitPipeline;
use crate::shutdown::ShutdownSignal;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Batch-level failure. The continuous loop logs these and retries after the
/// error backoff; they are fatal only at startup.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("progress state: {0}")]
    State(#[from] CursorError),
    #[error("commit source: {0}")]
    Source(#[from] GitError),
}

// ---------------------------------------------------------------------------
// BatchSummary
// ---------------------------------------------------------------------------

/// Result of one `process_new_commits` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Commits returned by the source for this batch.
    pub found: usize,
    /// Commits that produced a usable note.
    pub processed: usize,
    /// Commits that errored or fell back to a placeholder note.
    pub failed: usize,
    /// Cursor value persisted at the end of the batch, if any.
    pub cursor: Option<String>,
}

impl BatchSummary {
    pub fn empty() -> Self {
        Self {
            found: 0,
            processed: 0,
            failed: 0,
            cursor: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The monitoring core: commit discovery, per-commit processing, cursor
/// bookkeeping, and the polling loop.
pub struct Orchestrator {
    source: Arc<dyn CommitSource>,
    pipeline: CommitPipeline,
    cursor: CursorStore,
    monitor: MonitorConfig,
    shutdown: ShutdownSignal,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn CommitSource>,
        generator: Arc<dyn NoteGenerator>,
        sink: Option<Arc<dyn PublishSink>>,
        gate: Arc<dyn SignificanceGate>,
        cursor: CursorStore,
        document: DocumentStore,
        monitor: MonitorConfig,
    ) -> Self {
        let pipeline = CommitPipeline::new(source.clone(), generator, sink, gate, document);
        Self {
            source,
            pipeline,
            cursor,
            monitor,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Handle for triggering shutdown from another task (ctrl-c handler).
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// One polling pass: discover commits newer than the cursor, process
    /// them in the order returned, then persist the new cursor.
    ///
    /// The source returns newest-first, so the first element is the next
    /// cursor value. Per-commit failures are logged and counted but never
    /// abort the batch; whether they block the cursor write is decided by
    /// the configured [`CursorPolicy`].
    pub async fn process_new_commits(&self) -> Result<BatchSummary, OrchestratorError> {
        let cursor = self.cursor.read()?;
        let commits = self
            .source
            .list_since(cursor.as_deref(), self.monitor.max_commits_per_check)
            .await?;

        if commits.is_empty() {
            debug!("no new commits");
            return Ok(BatchSummary::empty());
        }

        info!(
            count = commits.len(),
            cursor = cursor.as_deref().unwrap_or("none"),
            "processing new commits"
        );

        let newest = commits[0].id.clone();

        let mut processed = 0;
        let mut failed = 0;
        for commit in &commits {
            info!(
                commit = %commit.short_id(),
                subject = commit.subject(),
                "processing commit"
            );
            match self.pipeline.process(commit).await {
                Ok(outcome) if outcome.succeeded() => processed += 1,
                Ok(_) => failed += 1,
                Err(e) => {
                    failed += 1;
                    error!(
                        commit = %commit.short_id(),
                        stage = e.stage(),
                        error = %e,
                        "commit processing failed"
                    );
                }
            }
        }

        let persisted = self.advance_cursor(&newest, failed);
        Ok(BatchSummary {
            found: commits.len(),
            processed,
            failed,
            cursor: persisted,
        })
    }

    /// The single cursor write for the batch. A write failure here is
    /// recoverable: we log it and let the next interval retry the batch.
    fn advance_cursor(&self, newest: &str, failed: usize) -> Option<String> {
        if failed > 0 && self.monitor.cursor_policy == CursorPolicy::HoldOnFailure {
            warn!(
                failed,
                cursor = %newest,
                "holding cursor, batch will be retried next interval"
            );
            return None;
        }

        match self.cursor.write(newest) {
            Ok(()) => {
                debug!(cursor = %newest, "cursor advanced");
                Some(newest.to_string())
            }
            Err(e) => {
                error!(
                    error = %e,
                    cursor = %newest,
                    "cursor write failed, batch may be reprocessed"
                );
                None
            }
        }
    }

    /// Poll until shutdown. Batch errors back off for
    /// `monitor.error_backoff_secs` instead of the regular interval; the
    /// shutdown signal is only observed between batches and during sleeps,
    /// so a commit in flight always completes.
    pub async fn run_continuous(&self) -> Result<(), OrchestratorError> {
        // Unusable progress state at startup is fatal; the same failure
        // mid-run only costs one cursor advance.
        let initial = self.cursor.ensure_accessible()?;
        info!(
            cursor = initial.as_deref().unwrap_or("none"),
            interval_secs = self.monitor.interval_secs,
            "monitor starting"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if self.shutdown.is_shutting_down() {
                break;
            }

            let delay = match self.process_new_commits().await {
                Ok(summary) => {
                    if summary.found > 0 {
                        info!(
                            found = summary.found,
                            processed = summary.processed,
                            failed = summary.failed,
                            cursor = summary.cursor.as_deref().unwrap_or("unchanged"),
                            "batch complete"
                        );
                    }
                    Duration::from_secs(self.monitor.interval_secs)
                }
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_secs = self.monitor.error_backoff_secs,
                        "check failed, backing off"
                    );
                    Duration::from_secs(self.monitor.error_backoff_secs)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping monitor");
                    break;
                }
            }
        }

        info!("monitor stopped");
        Ok(())
    }
}
