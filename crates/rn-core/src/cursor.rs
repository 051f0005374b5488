use std::io::Write;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// CursorStore
// ---------------------------------------------------------------------------

/// File-backed progress cursor: the identifier of the last fully processed
/// commit, or nothing if no commit has ever been processed.
///
/// The cursor is the sole persisted state of the monitoring loop. It is a
/// single line in a dedicated file; writes go through a temp file and rename
/// so a crash never leaves a torn value.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cursor. Absence (or an empty file) means "process all
    /// history from the beginning".
    pub fn read(&self) -> Result<Option<String>, CursorError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let value = raw.trim();
        if value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(value.to_string()))
        }
    }

    /// Persist a new cursor value atomically.
    pub fn write(&self, cursor: &str) -> Result<(), CursorError> {
        self.ensure_parent()?;
        let tmp = self.tmp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(cursor.trim().as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Startup probe: read the current value and verify the location is
    /// writable. An unusable cursor here is fatal; the same failure mid-run
    /// only skips one advance.
    pub fn ensure_accessible(&self) -> Result<Option<String>, CursorError> {
        let current = self.read()?;
        self.ensure_parent()?;
        let probe = self.tmp_path();
        std::fs::write(&probe, b"")?;
        std::fs::remove_file(&probe)?;
        Ok(current)
    }

    fn ensure_parent(&self) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
