//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile the resource table and resolve the active vendor
//! - Connect the broker and make sure every topic is captured
//! - Wire dispatcher, audit relay and pipeline into the HTTP state
//! - Bind the ingress listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::{AuditRelay, EnvelopeBuilder};
use crate::backend::{ActiveBackend, BackendDispatcher, HttpDispatcher};
use crate::broker::{MemoryPublisher, NatsTopicPublisher, PublishError, TopicPublisher};
use crate::config::{BrokerConfig, BrokerKind, ConfigError, RelayConfig};
use crate::http::AppState;
use crate::pipeline::ResourcePipeline;
use crate::resilience::TimeoutDispatcher;
use crate::routing::ResourceTable;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("broker setup failed: {0}")]
    Broker(#[from] PublishError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics exporter failed to start: {0}")]
    Metrics(String),
}

/// Everything the server needs, plus the audit worker to drain at shutdown.
pub struct Services {
    pub state: AppState,
    pub audit_worker: JoinHandle<()>,
}

/// Resolve, connect and assemble in dependency order.
pub async fn build_services(config: &RelayConfig) -> Result<Services, StartupError> {
    let resources = ResourceTable::build(&config.resource_configs(), &config.audit.topic)?;
    let backend = ActiveBackend::resolve(&config.fhir)?;

    let mut topics = resources.topics();
    topics.push(config.audit.topic.clone());
    let publisher = connect_publisher(&config.broker, &topics).await?;

    Ok(assemble(config, resources, backend, publisher))
}

/// Connect the configured broker adapter.
pub async fn connect_publisher(
    config: &BrokerConfig,
    topics: &[String],
) -> Result<Arc<dyn TopicPublisher>, StartupError> {
    match config.kind {
        BrokerKind::Nats => {
            let publisher = NatsTopicPublisher::connect(config).await?;
            publisher.ensure_stream(&config.stream_name, topics).await?;
            Ok(Arc::new(publisher))
        }
        BrokerKind::Memory => {
            tracing::warn!(
                capacity = config.memory_capacity,
                "Using in-memory broker; messages are not persisted"
            );
            Ok(Arc::new(MemoryPublisher::new(config.memory_capacity)))
        }
    }
}

/// Wire the pipeline over an already-connected publisher.
///
/// Spawns the audit worker, so this must run inside a Tokio runtime.
pub fn assemble(
    config: &RelayConfig,
    resources: ResourceTable,
    backend: ActiveBackend,
    publisher: Arc<dyn TopicPublisher>,
) -> Services {
    let http = HttpDispatcher::new(backend.clone());
    let dispatcher: Arc<dyn BackendDispatcher> = if config.timeouts.backend_secs > 0 {
        let limited =
            TimeoutDispatcher::new(http, Duration::from_secs(config.timeouts.backend_secs));
        tracing::debug!(timeout = ?limited.timeout(), "Backend calls are time-limited");
        Arc::new(limited)
    } else {
        Arc::new(http)
    };

    let (relay, queue) = AuditRelay::new(config.audit.topic.clone(), config.audit.queue_capacity);
    let audit_worker = queue.spawn(publisher.clone(), config.audit.max_in_flight);

    let pipeline_run_id = Uuid::new_v4().to_string();
    let envelopes = EnvelopeBuilder::new(&config.audit, pipeline_run_id.clone());
    let pipeline = ResourcePipeline::new(publisher, dispatcher, relay, envelopes);

    tracing::info!(
        pipeline_run_id = %pipeline_run_id,
        vendor = %backend.vendor(),
        resources = resources.len(),
        audit_topic = %config.audit.topic,
        backend_timeout_secs = config.timeouts.backend_secs,
        "Pipeline assembled"
    );

    Services {
        state: AppState {
            pipeline: Arc::new(pipeline),
            resources: Arc::new(resources),
            backend,
        },
        audit_worker,
    }
}

/// Bind the ingress listener.
pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    let bind_err = |source| StartupError::Bind {
        address: address.to_string(),
        source,
    };
    let addr: SocketAddr = address.parse().map_err(|e| {
        bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;
    TcpListener::bind(addr).await.map_err(bind_err)
}
