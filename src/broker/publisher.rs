//! Topic publisher abstraction.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while talking to the broker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Could not connect or set up the broker at startup.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// Broker refused or could not take the message.
    #[error("publish to '{topic}' failed: {reason}")]
    Rejected { topic: String, reason: String },

    /// Message was sent but the broker never acknowledged it.
    #[error("publish to '{topic}' was not acknowledged: {reason}")]
    NotAcknowledged { topic: String, reason: String },
}

/// At-least-once publish of a payload to a named topic.
///
/// Returns once the broker has acknowledged the message. No ordering key is
/// derived from the payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError>;
}
