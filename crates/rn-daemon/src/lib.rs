//! Release-notes daemon: watches a repository, turns new commits into
//! notes, maintains the changelog document, and pushes notifications.
//!
//! The binary `relnote` wires concrete backends (libgit2, chat-completions
//! HTTP, webhook) into the [`orchestrator::Orchestrator`]; everything in this
//! crate works against the collaborator traits so tests run on mocks.

pub mod logging;
pub mod manual;
pub mod orchestrator;
pub mod pipeline;
pub mod shutdown;
