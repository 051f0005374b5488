//! Delivery error type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The request never produced a response (connect failure, timeout).
    #[error("webhook request failed: {0}")]
    Http(String),

    /// The webhook answered with a non-success status.
    #[error("delivery rejected with status {status}: {body}")]
    Delivery { status: u16, body: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err.to_string())
    }
}
