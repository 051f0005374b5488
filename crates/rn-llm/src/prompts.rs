//! Prompt templates for note generation and file summarization.
//!
//! Templates are plain strings with `{variable}` placeholders expanded at
//! runtime. Each builder returns the full message list for one provider
//! call, system message included.

use std::collections::HashMap;

use rn_core::types::{ChangeSet, Commit};

use crate::provider::LlmMessage;

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// A named prompt template with `{variable}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Render the template with the given variables.
    pub fn render(&self, vars: &HashMap<String, String>) -> String {
        let mut output = self.template.clone();
        for (key, value) in vars {
            output = output.replace(&format!("{{{}}}", key), value);
        }
        output
    }
}

// ---------------------------------------------------------------------------
// Message builders
// ---------------------------------------------------------------------------

/// Messages asking for a release note covering one commit.
pub fn release_note_messages(commit: &Commit, changes: &ChangeSet) -> Vec<LlmMessage> {
    let template = PromptTemplate::new("release_note", RELEASE_NOTE_PROMPT);
    let mut vars = HashMap::new();
    vars.insert("message".into(), commit.message.clone());
    vars.insert("diff".into(), changes.diff.clone());

    vec![
        LlmMessage::system(RELEASE_NOTE_SYSTEM),
        LlmMessage::user(template.render(&vars)),
    ]
}

/// Messages asking for one consolidated note over a commit range.
///
/// Commits are listed in the order given (newest first, matching how the
/// range is fetched).
pub fn batch_note_messages(items: &[(Commit, ChangeSet)]) -> Vec<LlmMessage> {
    let commit_lines = items
        .iter()
        .map(|(commit, _)| {
            format!(
                "- {} {} ({})",
                commit.short_id(),
                commit.subject(),
                commit.author
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let combined_diff = items
        .iter()
        .map(|(_, changes)| changes.diff.as_str())
        .filter(|diff| !diff.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let template = PromptTemplate::new("batch_note", BATCH_NOTE_PROMPT);
    let mut vars = HashMap::new();
    vars.insert("commits".into(), commit_lines);
    vars.insert("diff".into(), combined_diff);

    vec![
        LlmMessage::system(RELEASE_NOTE_SYSTEM),
        LlmMessage::user(template.render(&vars)),
    ]
}

/// Messages asking for a beginner-friendly summary of one project file.
pub fn file_summary_messages(path: &str, head: &str) -> Vec<LlmMessage> {
    let template = PromptTemplate::new("file_summary", FILE_SUMMARY_PROMPT);
    let mut vars = HashMap::new();
    vars.insert("path".into(), path.to_string());
    vars.insert("content".into(), head.to_string());

    vec![
        LlmMessage::system(FILE_SUMMARY_SYSTEM),
        LlmMessage::user(template.render(&vars)),
    ]
}

// ---------------------------------------------------------------------------
// Built-in prompt text constants
// ---------------------------------------------------------------------------

/// Trivial prompt used by the connectivity check.
pub const CONNECTIVITY_PROMPT: &str = "Hello, how can I assist you today?";

pub const RELEASE_NOTE_SYSTEM: &str = "You are a release note generator for repository changes.";

const RELEASE_NOTE_PROMPT: &str = "\
Commit message:
{message}

Changes:
{diff}

Generate a concise and actionable release note summarizing the meaningful updates in this commit. \
Focus on providing clear information that helps developers and stakeholders understand the changes.

Include the following details:
- A high-level summary of the changes.
- The purpose of the changes and the problem they solve.
- Any new features, bug fixes, or improvements introduced.
- Highlight breaking changes, if any, and how they might affect the system.
- Mention any dependencies or configurations that need to be updated.

Additionally:
- Suggest 1-2 possible future improvements or optimizations related to these changes.
- Identify the commit type (choose one: Feature, Bugfix, Refactor, Docs, Chore).
- Check for any secrets (API keys, tokens, passwords) that may have been committed.
- Highlight any potential security risks (e.g., hardcoded credentials, missing input validation, insecure configs).
- Provide a summary that can be directly used in a changelog or release note.

Ensure the output is structured, concise, and developer-friendly.";

const BATCH_NOTE_PROMPT: &str = "\
The following commits are being released together (newest first):

{commits}

Combined changes:
{diff}

Generate comprehensive release notes covering all of these commits as one release. \
Group related changes together rather than listing commits one by one.

Include the following details:
- A high-level summary of the release.
- New features, bug fixes, and improvements, grouped by area.
- Breaking changes, if any, and how they might affect the system.
- Dependencies or configurations that need to be updated.

Ensure the output is structured, concise, and developer-friendly, suitable for \
publishing as release notes without further editing.";

pub const FILE_SUMMARY_SYSTEM: &str = "You are a helpful project documentation tool.";

const FILE_SUMMARY_PROMPT: &str = "\
I have a project file at '{path}'. Here is a snippet of its content:
-----
{content}
-----
Explain in simple, beginner-friendly language what this file is for, what it does, \
and how it fits in the project.";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
