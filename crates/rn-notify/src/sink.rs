//! Publish sinks.
//!
//! [`WebhookSink`] posts to a Teams-style incoming webhook; [`MockSink`]
//! captures publishes for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use rn_core::types::{Commit, Note};

use crate::error::NotifyError;

// ---------------------------------------------------------------------------
// Context and trait
// ---------------------------------------------------------------------------

/// What a published note is about, used for the message heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishContext {
    /// A note for one commit.
    Commit { id: String, subject: String },
    /// One combined note covering a manual range.
    Batch { commits: usize },
}

impl PublishContext {
    pub fn commit(commit: &Commit) -> Self {
        PublishContext::Commit {
            id: commit.short_id().to_string(),
            subject: commit.subject().to_string(),
        }
    }

    pub fn batch(commits: usize) -> Self {
        PublishContext::Batch { commits }
    }
}

/// Delivers a finished note to a notification channel.
///
/// Failure is non-fatal to the caller: the orchestrator logs a
/// [`NotifyError`] and continues processing.
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, note: &Note, context: &PublishContext) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// WebhookSink
// ---------------------------------------------------------------------------

/// HTTP POST of `{"text": …}` to an incoming-webhook URL.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    channel: String,
    mention_users: Vec<String>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            channel: "Release Notes".to_string(),
            mention_users: Vec::new(),
        }
    }

    /// Channel name shown as the message heading.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Users appended as `@name` mentions after the note body.
    pub fn with_mentions(mut self, users: Vec<String>) -> Self {
        self.mention_users = users;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    /// The message body sent to the webhook.
    pub fn format_message(&self, note: &Note, context: &PublishContext) -> String {
        let mut message = format!("**{}**\n\n", self.channel);

        match context {
            PublishContext::Commit { id, subject } => {
                message.push_str(&format!("**{subject}** (`{id}`)\n\n"));
            }
            PublishContext::Batch { commits } => {
                let noun = if *commits == 1 { "commit" } else { "commits" };
                message.push_str(&format!("**Release update covering {commits} {noun}**\n\n"));
            }
        }

        message.push_str(&note.text);

        if !self.mention_users.is_empty() {
            message.push_str("\n\ncc:");
            for user in &self.mention_users {
                message.push_str(&format!(" @{user}"));
            }
        }

        message
    }

    /// Full request payload, exposed for tests.
    pub fn build_payload(&self, note: &Note, context: &PublishContext) -> serde_json::Value {
        json!({ "text": self.format_message(note, context) })
    }
}

#[async_trait]
impl PublishSink for WebhookSink {
    async fn publish(&self, note: &Note, context: &PublishContext) -> Result<(), NotifyError> {
        let payload = self.build_payload(note, context);

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "notification delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Test sink that records every publish and can replay queued failures.
#[derive(Default)]
pub struct MockSink {
    results: Mutex<VecDeque<Result<(), NotifyError>>>,
    published: Mutex<Vec<(Note, PublishContext)>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next publish. Once the queue is drained,
    /// publishes succeed.
    pub fn with_error(self, error: NotifyError) -> Self {
        self.results.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn published(&self) -> Vec<(Note, PublishContext)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishSink for MockSink {
    async fn publish(&self, note: &Note, context: &PublishContext) -> Result<(), NotifyError> {
        self.published
            .lock()
            .unwrap()
            .push((note.clone(), context.clone()));

        match self.results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
