//! Notification delivery for generated release notes.
//!
//! A [`PublishSink`] takes a finished note and pushes it to a chat channel.
//! Delivery is best-effort by contract: callers log failures and move on, so
//! a dead webhook never blocks commit processing.

pub mod error;
pub mod sink;

pub use error::NotifyError;
pub use sink::{MockSink, PublishContext, PublishSink, WebhookSink};
