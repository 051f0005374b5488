//! Repository documentation generation.
//!
//! Walks the project tree, asks the model for a beginner-friendly summary of
//! each source file's head, and composes a README-style document with a table
//! of contents. Per-file failures are embedded in the output rather than
//! aborting the run, so one unreadable file never costs the whole document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use rn_core::config::DocsConfig;

use crate::prompts;
use crate::provider::{LlmConfig, LlmProvider};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("documentation I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How much of each file the model sees.
const SUMMARY_HEAD_CHARS: usize = 1500;

// ---------------------------------------------------------------------------
// DocsGenerator
// ---------------------------------------------------------------------------

pub struct DocsGenerator {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
    docs: DocsConfig,
}

impl DocsGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig, docs: DocsConfig) -> Self {
        Self {
            provider,
            config,
            docs,
        }
    }

    /// Produce the full documentation text for the tree rooted at `root`.
    ///
    /// The caller owns writing the result to disk.
    pub async fn generate(&self, root: &Path) -> Result<String, DocsError> {
        let files = self.collect_files(root)?;

        let mut entries = Vec::with_capacity(files.len());
        for file in &files {
            let display_name = display_path(root, file);
            debug!(file = %display_name, "summarizing");
            let summary = self.summarize_file(file, &display_name).await;
            entries.push((display_name, summary));
        }

        Ok(compose_readme(&entries))
    }

    /// Source files under `root`, skipping ignored directories and foreign
    /// extensions, sorted by path for stable output.
    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>, DocsError> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();

                if path.is_dir() {
                    if !self.docs.ignore_patterns.iter().any(|p| p == &name) {
                        stack.push(path);
                    }
                    continue;
                }

                let matches_extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| {
                        self.docs.source_extensions.iter().any(|s| s == ext)
                    });
                if matches_extension {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Summary text for one file. Errors become explanatory text in place of
    /// the summary.
    async fn summarize_file(&self, path: &Path, display: &str) -> String {
        let head = match read_head(path) {
            Ok(head) => head,
            Err(e) => return format!("Could not summarize {display}: {e}"),
        };

        let messages = prompts::file_summary_messages(display, &head);
        match self.provider.complete(&messages, &self.config).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => format!("Could not summarize {display}: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn display_path(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

fn read_head(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.chars().take(SUMMARY_HEAD_CHARS).collect())
}

/// GitHub-style anchor for a heading made from a file path.
fn anchor(path: &str) -> String {
    path.chars()
        .filter(|c| !matches!(c, '.' | '/' | '_' | '-'))
        .collect::<String>()
        .to_lowercase()
}

fn compose_readme(entries: &[(String, String)]) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");

    let toc = entries
        .iter()
        .map(|(display, _)| format!("- [{display}](#{})", anchor(display)))
        .collect::<Vec<_>>()
        .join("\n");

    let sections = entries
        .iter()
        .map(|(display, summary)| format!("### {display}\n\n{summary}\n"))
        .collect::<Vec<_>>()
        .join("\n---\n\n");

    format!(
        "# Repository Documentation (Auto-Generated)\n\n\
         This README is auto-generated and explains every source file in simple \
         language, so anyone can quickly understand the purpose of each file in \
         the project.\n\n\
         *Last updated: {timestamp}*\n\n\
         ## Table of Contents\n\n\
         {toc}\n\n\
         ---\n\n\
         {sections}\n\
         ---\n\n\
         ## How to Regenerate This Documentation\n\n\
         To update this file with the latest summaries, run:\n\n\
         ```bash\nrelnote docs\n```\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LlmError, MockProvider};

    fn generator_with(provider: MockProvider) -> DocsGenerator {
        DocsGenerator::new(
            Arc::new(provider),
            LlmConfig::default(),
            DocsConfig::default(),
        )
    }

    fn scratch_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        fs::write(dir.path().join(".git/config"), "[core]\n").unwrap();
        fs::write(dir.path().join("target/debug/gen.rs"), "// built\n").unwrap();
        fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(dir.path().join("README.md"), "# Docs\n").unwrap();
        dir
    }

    #[test]
    fn collect_skips_ignored_dirs_and_foreign_extensions() {
        let dir = scratch_tree();
        let generator = generator_with(MockProvider::new());

        let files = generator.collect_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| display_path(dir.path(), f))
            .collect();

        assert_eq!(names, vec!["Cargo.toml", "src/main.rs"]);
    }

    #[test]
    fn anchor_matches_heading_format() {
        assert_eq!(anchor("src/main.rs"), "srcmainrs");
        assert_eq!(anchor("my-crate/lib_test.rs"), "mycratelibtestrs");
    }

    #[tokio::test]
    async fn generate_composes_toc_and_sections() {
        let dir = scratch_tree();
        let generator = generator_with(MockProvider::new());

        let readme = generator.generate(dir.path()).await.unwrap();

        assert!(readme.starts_with("# Repository Documentation (Auto-Generated)"));
        assert!(readme.contains("- [src/main.rs](#srcmainrs)"));
        assert!(readme.contains("- [Cargo.toml](#cargotoml)"));
        assert!(readme.contains("### src/main.rs"));
        assert!(readme.contains("Mock response"));
        assert!(readme.contains("*Last updated: "));
        assert!(readme.contains("relnote docs"));
    }

    #[tokio::test]
    async fn summarize_failure_is_embedded_not_fatal() {
        let dir = scratch_tree();
        let generator = generator_with(
            MockProvider::new()
                .with_error(LlmError::Timeout)
                .with_error(LlmError::Timeout),
        );

        let readme = generator.generate(dir.path()).await.unwrap();
        assert!(readme.contains("Could not summarize"));
        // The document is still complete.
        assert!(readme.contains("## Table of Contents"));
    }
}
