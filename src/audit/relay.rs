//! Fire-and-forget relay of audit envelopes to the operations topic.
//!
//! # Responsibilities
//! - Encode envelopes on the caller's task, then hand them off without waiting
//! - Drop (and count) envelopes when the queue is full
//! - Publish from a detached worker with bounded concurrency
//! - Drain everything still queued once every sender is gone
//!
//! # Design Decisions
//! - `relay` is synchronous so it can run inside `Drop`
//! - Publish failures are logged and swallowed; the pipeline never sees them

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audit::envelope::AuditEnvelope;
use crate::broker::TopicPublisher;
use crate::observability::metrics;

/// What happened to a relayed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Accepted by the queue; the worker will publish it.
    Queued,
    /// Queue full or worker gone; the envelope is lost.
    Dropped,
}

#[derive(Debug)]
struct QueuedRecord {
    exchange_id: String,
    message_id: String,
    payload: Bytes,
}

/// Sending half, cloned into every pipeline run.
#[derive(Debug, Clone)]
pub struct AuditRelay {
    tx: mpsc::Sender<QueuedRecord>,
}

/// Receiving half, consumed by [`AuditQueue::spawn`].
#[derive(Debug)]
pub struct AuditQueue {
    rx: mpsc::Receiver<QueuedRecord>,
    topic: String,
}

impl AuditRelay {
    /// Create a relay for `topic` holding at most `capacity` pending envelopes.
    pub fn new(topic: impl Into<String>, capacity: usize) -> (AuditRelay, AuditQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            AuditRelay { tx },
            AuditQueue {
                rx,
                topic: topic.into(),
            },
        )
    }

    /// Queue an envelope for publishing.
    ///
    /// Fails only when the envelope cannot be encoded.
    pub fn relay(&self, envelope: &AuditEnvelope) -> Result<RelayOutcome, serde_json::Error> {
        let record = QueuedRecord {
            exchange_id: envelope.exchange_id.clone(),
            message_id: envelope.message_id.clone(),
            payload: envelope.to_record()?,
        };

        match self.tx.try_send(record) {
            Ok(()) => {
                metrics::record_audit("queued");
                Ok(RelayOutcome::Queued)
            }
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    exchange_id = %record.exchange_id,
                    message_id = %record.message_id,
                    "Audit queue full, dropping envelope"
                );
                metrics::record_audit("dropped");
                Ok(RelayOutcome::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                warn!(
                    exchange_id = %record.exchange_id,
                    message_id = %record.message_id,
                    "Audit worker stopped, dropping envelope"
                );
                metrics::record_audit("dropped");
                Ok(RelayOutcome::Dropped)
            }
        }
    }
}

impl AuditQueue {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Start the worker.
    ///
    /// The returned handle completes after every sender has been dropped and
    /// every queued envelope has been published or has failed.
    pub fn spawn(
        self,
        publisher: Arc<dyn TopicPublisher>,
        max_in_flight: usize,
    ) -> JoinHandle<()> {
        let max_in_flight = max_in_flight.max(1);
        debug!(topic = %self.topic(), max_in_flight, "Audit worker starting");
        let AuditQueue { mut rx, topic } = self;
        let topic: Arc<str> = Arc::from(topic);

        tokio::spawn(async move {
            let in_flight = Arc::new(Semaphore::new(max_in_flight));

            while let Some(record) = rx.recv().await {
                let Ok(permit) = in_flight.clone().acquire_owned().await else {
                    break;
                };
                let publisher = publisher.clone();
                let topic = topic.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    match publisher.publish(&topic, record.payload).await {
                        Ok(()) => {
                            debug!(
                                exchange_id = %record.exchange_id,
                                message_id = %record.message_id,
                                "Audit envelope published"
                            );
                            metrics::record_audit("published");
                        }
                        Err(e) => {
                            warn!(
                                exchange_id = %record.exchange_id,
                                message_id = %record.message_id,
                                error = %e,
                                "Audit publish failed"
                            );
                            metrics::record_audit("failed");
                        }
                    }
                });
            }

            // Wait for the publishes still in flight.
            let _ = in_flight.acquire_many(max_in_flight as u32).await;
            debug!(topic = %topic, "Audit worker drained");
        })
    }
}
