//! Commit retrieval via libgit2 (git2 crate).
//!
//! Read-only: this crate never writes to the repository. Everything the
//! monitoring loop knows about history comes through the [`CommitSource`]
//! trait, so tests substitute [`MockCommitSource`] for a real work tree.

pub mod error;
pub mod source;

pub use error::GitError;
pub use source::{CommitSource, GitCommitSource, MockCommitSource};
