//! Manual range mode: one consolidated note for an explicit commit range.
//!
//! Runs outside the monitoring loop and never touches the progress cursor.
//! The result lands in a timestamp-named artifact so repeated runs never
//! overwrite each other.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use rn_core::types::{ChangeSet, Commit, Note};
use rn_git::{CommitSource, GitError};
use rn_llm::{GeneratorError, NoteGenerator};
use rn_notify::{PublishContext, PublishSink};

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

/// Manual-mode failures surface as a non-zero exit; there is no loop to
/// absorb them.
#[derive(Debug, Error)]
pub enum ManualError {
    #[error("commit source: {0}")]
    Source(#[from] GitError),
    #[error("note generation: {0}")]
    Generate(#[from] GeneratorError),
    #[error("artifact write: {0}")]
    Io(#[from] std::io::Error),
}

/// What a manual run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualOutcome {
    Written { path: PathBuf, commits: usize },
    /// Range was empty, or carried nothing worth writing about.
    NothingToDo,
}

// ---------------------------------------------------------------------------
// ManualRun
// ---------------------------------------------------------------------------

/// On-demand generation over `(start, end]`. Deliberately holds no cursor
/// store: this mode cannot disturb the monitor's progress even by accident.
pub struct ManualRun {
    source: Arc<dyn CommitSource>,
    generator: Arc<dyn NoteGenerator>,
    sink: Option<Arc<dyn PublishSink>>,
    output_dir: PathBuf,
    /// Range size when both bounds are omitted.
    default_limit: usize,
}

impl ManualRun {
    pub fn new(
        source: Arc<dyn CommitSource>,
        generator: Arc<dyn NoteGenerator>,
        sink: Option<Arc<dyn PublishSink>>,
        output_dir: impl Into<PathBuf>,
        default_limit: usize,
    ) -> Self {
        Self {
            source,
            generator,
            sink,
            output_dir: output_dir.into(),
            default_limit,
        }
    }

    pub async fn run(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<ManualOutcome, ManualError> {
        let commits = self
            .source
            .list_range(start, end, self.default_limit)
            .await?;
        if commits.is_empty() {
            info!("no commits in the requested range");
            return Ok(ManualOutcome::NothingToDo);
        }

        info!(count = commits.len(), "generating combined release notes");

        let mut items = Vec::with_capacity(commits.len());
        for commit in &commits {
            let changes = match self.source.changes(&commit.id).await {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(
                        commit = %commit.short_id(),
                        error = %e,
                        "change fetch failed, continuing without its diff"
                    );
                    ChangeSet::empty()
                }
            };
            items.push((commit.clone(), changes));
        }

        let note = self.generator.generate_batch(&items).await?;
        if note.is_no_change() {
            info!("range carries no meaningful changes, skipping artifact");
            return Ok(ManualOutcome::NothingToDo);
        }

        let now = Utc::now();
        let path = artifact_path(&self.output_dir, now);
        write_atomic(&path, &render_artifact(now, &commits, &note))?;
        info!(path = %path.display(), "release notes written");

        if let Some(sink) = &self.sink {
            match sink
                .publish(&note, &PublishContext::batch(commits.len()))
                .await
            {
                Ok(()) => info!("combined note published"),
                Err(e) => warn!(error = %e, "notification delivery failed"),
            }
        }

        Ok(ManualOutcome::Written {
            path,
            commits: commits.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Artifact helpers
// ---------------------------------------------------------------------------

fn artifact_path(output_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    output_dir.join(format!("release_notes_{}.md", now.format("%Y%m%d_%H%M%S")))
}

fn render_artifact(now: DateTime<Utc>, commits: &[Commit], note: &Note) -> String {
    let mut lines = Vec::new();
    for commit in commits {
        if commit.author.is_empty() {
            lines.push(format!("- `{}` {}", commit.short_id(), commit.subject()));
        } else {
            lines.push(format!(
                "- `{}` {} ({})",
                commit.short_id(),
                commit.subject(),
                commit.author
            ));
        }
    }

    format!(
        "# Release Notes\n\n\
         *Generated: {}*\n\n\
         ## Commits\n\n\
         {}\n\n\
         ## Notes\n\n\
         {}\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        lines.join("\n"),
        note.text.trim()
    )
}

/// Full-or-nothing file write via temp file and rename.
pub fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
