//! NATS JetStream topic publisher.
//!
//! Topics map one-to-one onto JetStream subjects. A single stream captures
//! every configured topic so publishes are persisted and acknowledged.

use std::time::Duration;

use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::broker::publisher::{PublishError, TopicPublisher};
use crate::config::BrokerConfig;

pub struct NatsTopicPublisher {
    jetstream: jetstream::Context,
}

impl NatsTopicPublisher {
    /// Connect to the broker.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, PublishError> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        info!(url = %config.url, timeout = ?timeout, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(config.url.as_str())
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        info!("Successfully connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client),
        })
    }

    /// Make sure `stream_name` exists and captures every topic in `subjects`.
    pub async fn ensure_stream(
        &self,
        stream_name: &str,
        subjects: &[String],
    ) -> Result<(), PublishError> {
        match self.jetstream.get_stream(stream_name).await {
            Ok(stream) => {
                let mut config = stream.cached_info().config.clone();
                let missing: Vec<String> = subjects
                    .iter()
                    .filter(|s| !config.subjects.contains(s))
                    .cloned()
                    .collect();

                if missing.is_empty() {
                    info!(stream = %stream_name, "Stream already exists");
                    return Ok(());
                }

                config.subjects.extend(missing.iter().cloned());
                self.jetstream
                    .update_stream(config)
                    .await
                    .map_err(|e| PublishError::Connect(format!("update stream: {e}")))?;
                info!(stream = %stream_name, added = ?missing, "Extended stream subjects");
            }
            Err(_) => {
                let config = StreamConfig {
                    name: stream_name.to_string(),
                    subjects: subjects.to_vec(),
                    description: Some("FHIR relay resource and audit topics".to_string()),
                    ..Default::default()
                };
                self.jetstream
                    .create_stream(config)
                    .await
                    .map_err(|e| PublishError::Connect(format!("create stream: {e}")))?;
                info!(stream = %stream_name, subjects = subjects.len(), "Created stream");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TopicPublisher for NatsTopicPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        let size_bytes = payload.len();

        let ack = self
            .jetstream
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| PublishError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        ack.await.map_err(|e| PublishError::NotAcknowledged {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        debug!(topic = %topic, size_bytes, "Published and acknowledged");
        Ok(())
    }
}
