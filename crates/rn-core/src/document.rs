use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::types::{ChangeSet, Commit};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document changed on disk since it was read")]
    ConcurrentEdit,
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Snapshot of the document as read from disk. Carries the modification
/// time observed at read so a later write can detect external edits.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub text: String,
    modified: Option<SystemTime>,
}

impl DocumentSnapshot {
    /// Snapshot of a document that does not exist yet.
    pub fn missing() -> Self {
        Self {
            text: String::new(),
            modified: None,
        }
    }
}

/// Read-modify-write access to the living document (README/changelog).
///
/// Processing is single-threaded, so no locking is needed between commits;
/// the modification-time check only guards against a human editing the file
/// while the daemon holds a stale snapshot.
pub struct DocumentStore {
    path: PathBuf,
    backup: bool,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>, backup: bool) -> Self {
        Self {
            path: path.into(),
            backup,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing file is an empty document.
    pub fn read(&self) -> Result<DocumentSnapshot, DocumentError> {
        if !self.path.exists() {
            return Ok(DocumentSnapshot::missing());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let modified = std::fs::metadata(&self.path)?.modified().ok();
        Ok(DocumentSnapshot {
            text,
            modified,
        })
    }

    /// Overwrite the document with new text, atomically.
    ///
    /// Refuses the write when the file changed on disk after `snapshot` was
    /// taken. When backups are enabled, a one-time `.bak` copy is written
    /// before the document's first modification.
    pub fn write(&self, snapshot: &DocumentSnapshot, new_text: &str) -> Result<(), DocumentError> {
        if let Some(read_mtime) = snapshot.modified {
            let current = std::fs::metadata(&self.path)
                .and_then(|m| m.modified())
                .ok();
            if current != Some(read_mtime) {
                return Err(DocumentError::ConcurrentEdit);
            }
        }

        if self.backup && self.path.exists() {
            let bak = self.backup_path();
            if !bak.exists() {
                std::fs::copy(&self.path, &bak)?;
                tracing::info!(path = %bak.display(), "created one-time document backup");
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.tmp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(new_text.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let mut bak = self.path.clone().into_os_string();
        bak.push(".bak");
        PathBuf::from(bak)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

// ---------------------------------------------------------------------------
// Entry formatting
// ---------------------------------------------------------------------------

/// Render the standard changelog block for one commit.
pub fn format_entry(
    timestamp: DateTime<Utc>,
    commit: &Commit,
    note_text: &str,
    changes: &ChangeSet,
) -> String {
    format!(
        "## [{}] - Latest Changes\n\n\
         ### Commit Message\n{}\n\n\
         ### Release Notes\n{}\n\n\
         ### Technical Details\n- Commit: `{}`\n- {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        commit.subject(),
        note_text.trim(),
        commit.short_id(),
        changes.stat_line(),
    )
}

/// Insert an entry block immediately after the document's title line.
///
/// Entries accumulate in reverse-chronological order; text below the
/// insertion point is carried over untouched. A document without a title
/// line gets one.
pub fn insert_entry(document: &str, entry: &str) -> String {
    let entry = entry.trim_end();
    if document.trim().is_empty() {
        return format!("# Changelog\n\n{entry}\n");
    }

    let lines: Vec<&str> = document.lines().collect();
    match lines.iter().position(|l| l.starts_with("# ")) {
        Some(title_idx) => {
            let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 4);
            out.extend_from_slice(&lines[..=title_idx]);
            out.push("");
            out.push(entry);
            let rest = &lines[title_idx + 1..];
            if rest.first().is_some_and(|l| !l.trim().is_empty()) {
                out.push("");
            }
            out.extend_from_slice(rest);
            let mut joined = out.join("\n");
            joined.push('\n');
            joined
        }
        None => format!("# Changelog\n\n{entry}\n\n{document}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_commit() -> Commit {
        Commit::new("abc123def4567890", "Add new export feature")
    }

    fn sample_changes() -> ChangeSet {
        let mut changes = ChangeSet::new("diff --git a/src/export.rs b/src/export.rs\n+fn export() {}", vec!["src/export.rs".into()]);
        changes.insertions = 1;
        changes
    }

    #[test]
    fn entry_contains_all_sections() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let entry = format_entry(ts, &sample_commit(), "Exports are now a thing.", &sample_changes());
        assert!(entry.starts_with("## [2025-03-14 09:26:53] - Latest Changes"));
        assert!(entry.contains("### Commit Message\nAdd new export feature"));
        assert!(entry.contains("### Release Notes\nExports are now a thing."));
        assert!(entry.contains("- Commit: `abc123de`"));
        assert!(entry.contains("1 file(s) changed"));
    }

    #[test]
    fn insert_into_empty_document_creates_title() {
        let doc = insert_entry("", "## [ts] - Latest Changes\nbody");
        assert!(doc.starts_with("# Changelog\n\n## [ts]"));
    }

    #[test]
    fn insert_prepends_after_title_keeping_old_entries() {
        let existing = "# Changelog\n\n## [old] - Latest Changes\nold body\n";
        let doc = insert_entry(existing, "## [new] - Latest Changes\nnew body");

        let new_pos = doc.find("## [new]").unwrap();
        let old_pos = doc.find("## [old]").unwrap();
        assert!(new_pos < old_pos, "new entry must come first: {doc}");
        assert!(doc.contains("old body"), "prior entries must survive: {doc}");
        assert!(doc.starts_with("# Changelog\n"));
    }

    #[test]
    fn insert_without_title_prepends_one() {
        let doc = insert_entry("some stray text\n", "## [new] - Latest Changes\nbody");
        assert!(doc.starts_with("# Changelog\n\n## [new]"));
        assert!(doc.contains("some stray text"));
    }

    #[test]
    fn store_read_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("CHANGELOG.md"), false);
        let snapshot = store.read().unwrap();
        assert!(snapshot.text.is_empty());
    }

    #[test]
    fn store_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("CHANGELOG.md"), false);
        let snapshot = store.read().unwrap();
        store.write(&snapshot, "# Changelog\n").unwrap();
        assert_eq!(store.read().unwrap().text, "# Changelog\n");
    }

    #[test]
    fn store_detects_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        std::fs::write(&path, "# Changelog\n").unwrap();

        let store = DocumentStore::new(&path, false);
        let snapshot = store.read().unwrap();

        // Simulate a human editing the file behind the daemon's back. Force
        // a distinct mtime in case the filesystem clock is coarse.
        std::fs::write(&path, "# Changelog\nedited externally\n").unwrap();
        let much_later = SystemTime::now() + std::time::Duration::from_secs(10);
        let file = std::fs::File::open(&path).unwrap();
        file.set_modified(much_later).unwrap();

        let result = store.write(&snapshot, "# Changelog\nfrom daemon\n");
        assert!(matches!(result, Err(DocumentError::ConcurrentEdit)));
        // The external edit must survive.
        assert!(std::fs::read_to_string(&path).unwrap().contains("edited externally"));
    }

    #[test]
    fn store_backs_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        std::fs::write(&path, "original\n").unwrap();

        let store = DocumentStore::new(&path, true);
        let snapshot = store.read().unwrap();
        store.write(&snapshot, "first rewrite\n").unwrap();

        let bak = dir.path().join("CHANGELOG.md.bak");
        assert_eq!(std::fs::read_to_string(&bak).unwrap(), "original\n");

        // A second write must not clobber the original backup.
        let snapshot = store.read().unwrap();
        store.write(&snapshot, "second rewrite\n").unwrap();
        assert_eq!(std::fs::read_to_string(&bak).unwrap(), "original\n");
    }
}
