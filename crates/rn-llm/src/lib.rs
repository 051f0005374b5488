//! Language-model backends and release-note generation.
//!
//! Provides a unified async trait for chat-completion providers (OpenAI,
//! Azure OpenAI) along with a mock provider for testing, the
//! [`NoteGenerator`] abstraction the orchestrator consumes, prompt
//! templates, and the repository documentation generator.

pub mod docs;
pub mod generator;
pub mod prompts;
pub mod provider;

pub use docs::{DocsError, DocsGenerator};
pub use generator::{GeneratorError, LlmNoteGenerator, MockGenerator, NoteGenerator};
pub use provider::{
    AzureOpenAiProvider, LlmConfig, LlmError, LlmMessage, LlmProvider, LlmResponse, LlmRole,
    MockProvider, OpenAiProvider,
};
