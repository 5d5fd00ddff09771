//! In-process broker for local runs and tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::broker::publisher::{PublishError, TopicPublisher};

/// A message accepted by the memory broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Records publishes in arrival order, keeping at most `capacity` messages.
#[derive(Debug)]
pub struct MemoryPublisher {
    messages: Mutex<VecDeque<PublishedMessage>>,
    capacity: usize,
}

impl MemoryPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of every retained message.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Payloads published to `topic`, oldest first.
    pub fn published_to(&self, topic: &str) -> Vec<Bytes> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl TopicPublisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        tracing::trace!(topic = %topic, retained = messages.len(), "Memory broker accepted message");
        Ok(())
    }
}
