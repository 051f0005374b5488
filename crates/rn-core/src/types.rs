use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A single observed commit. Immutable once constructed: the pipeline passes
/// commits through but never mutates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Stable revision identifier (full hex OID for git backends).
    pub id: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            author: String::new(),
            author_email: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Abbreviated identifier for log lines.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(8);
        &self.id[..end]
    }

    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// The textual changes belonging to one commit. Held only while that commit
/// is being processed; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Unified diff text.
    pub diff: String,
    /// Paths touched by the commit.
    pub files: Vec<String>,
    pub insertions: usize,
    pub deletions: usize,
}

impl ChangeSet {
    pub fn new(diff: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            diff: diff.into(),
            files,
            insertions: 0,
            deletions: 0,
        }
    }

    /// Change set with no content (merge commits, metadata-only revisions).
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when the commit carries changes worth writing about.
    pub fn is_meaningful(&self) -> bool {
        !self.diff.trim().is_empty() || !self.files.is_empty()
    }

    /// One-line summary used in log output and technical-details sections.
    pub fn stat_line(&self) -> String {
        format!(
            "{} file(s) changed, {} insertion(s), {} deletion(s)",
            self.files.len(),
            self.insertions,
            self.deletions
        )
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// What kind of text a note carries. Downstream steps branch on the kind,
/// never on the text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Model-written release note.
    Generated,
    /// Nothing worth writing about; skips both document update and publish.
    NoChange,
    /// Generation failed; placeholder text marks the gap.
    Fallback,
}

/// Release-note text for one commit or one batch of commits. Transient;
/// persisted only as a side effect inside the document or a manual-mode
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub kind: NoteKind,
    pub text: String,
}

impl Note {
    /// Fixed text for commits with no meaningful changes.
    pub const NO_CHANGE_TEXT: &'static str = "No meaningful changes detected.";

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            kind: NoteKind::Generated,
            text: text.into(),
        }
    }

    pub fn no_change() -> Self {
        Self {
            kind: NoteKind::NoChange,
            text: Self::NO_CHANGE_TEXT.to_string(),
        }
    }

    /// Placeholder note recorded when the model call failed.
    pub fn fallback(commit_id: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            kind: NoteKind::Fallback,
            text: format!(
                "[release note unavailable] Generation failed for commit {commit_id}: {reason}"
            ),
        }
    }

    pub fn is_no_change(&self) -> bool {
        self.kind == NoteKind::NoChange
    }

    pub fn is_generated(&self) -> bool {
        self.kind == NoteKind::Generated
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
