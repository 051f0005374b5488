use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GitError {
    /// The repository could not be opened or read.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// A commit id was not found in the repository.
    #[error("commit not found: {0}")]
    NotFound(String),

    /// A manual range is malformed (reversed bounds, unknown endpoints).
    #[error("invalid commit range: {0}")]
    InvalidRange(String),
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        match e.code() {
            git2::ErrorCode::NotFound => GitError::NotFound(e.message().to_string()),
            _ => GitError::Unavailable(e.message().to_string()),
        }
    }
}
