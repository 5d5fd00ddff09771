//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::catalog;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, ingress limits).
    pub listener: ListenerConfig,

    /// Ingress endpoint layout.
    pub ingress: IngressConfig,

    /// Message broker connection.
    pub broker: BrokerConfig,

    /// Backend FHIR server vendors and the active selection.
    pub fhir: FhirServerConfig,

    /// Audit envelope and wire-tap settings.
    pub audit: AuditConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Resource table. Empty means the built-in catalog.
    pub resources: Vec<ResourceConfig>,
}

impl RelayConfig {
    /// The resource rows this configuration describes, falling back to the catalog.
    pub fn resource_configs(&self) -> Vec<ResourceConfig> {
        if self.resources.is_empty() {
            catalog::default_resources()
        } else {
            self.resources.clone()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently processed requests (backpressure).
    pub max_connections: usize,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Where the per-resource endpoints are mounted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Common path prefix, e.g. "/iDAAS" gives "/iDAAS/patient".
    pub path_prefix: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/iDAAS".to_string(),
        }
    }
}

/// Which broker adapter backs the topic publisher.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// NATS JetStream.
    #[default]
    Nats,
    /// In-process recorder, for local runs and tests.
    Memory,
}

/// Broker connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub kind: BrokerKind,

    /// Broker connection string.
    pub url: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// JetStream stream that captures every configured topic.
    pub stream_name: String,

    /// Retained messages for the memory broker.
    pub memory_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Nats,
            url: "nats://localhost:4222".to_string(),
            connect_timeout_secs: 5,
            stream_name: "IDAAS_FHIR".to_string(),
            memory_capacity: 10_000,
        }
    }
}

/// Backend FHIR server vendors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FhirServerConfig {
    /// Active vendor identifier, selected once per process.
    pub vendor: String,

    /// Base URI per known vendor.
    pub servers: BTreeMap<String, String>,
}

impl Default for FhirServerConfig {
    fn default() -> Self {
        let servers = [
            ("hapi", "http://localhost:8080/fhir"),
            ("ibm", "http://localhost:8090/fhir-server/api/v4"),
            ("microsoft", "http://localhost:9090/fhir"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            vendor: "hapi".to_string(),
            servers,
        }
    }
}

/// Audit envelope and wire-tap configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Operations topic every envelope is relayed to.
    pub topic: String,

    /// `processingType` written into every envelope.
    pub processing_type: String,

    /// `industryStandard` written into every envelope.
    pub industry_standard: String,

    /// Envelopes buffered before new ones are dropped.
    pub queue_capacity: usize,

    /// Concurrent publishes issued by the relay worker.
    pub max_in_flight: usize,

    /// How long shutdown waits for queued envelopes.
    pub drain_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            topic: "opsmgmt_platformtransactions".to_string(),
            processing_type: "data".to_string(),
            industry_standard: "FHIR".to_string(),
            queue_capacity: 1024,
            max_in_flight: 32,
            drain_timeout_secs: 10,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole ingress request timeout in seconds.
    pub request_secs: u64,

    /// Backend round trip timeout in seconds; 0 disables the wrapper.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            backend_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    pub log_level: String,

    /// Log output format: pretty, compact or json.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// One row of the resource table. Only `name` is required.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Resource type, e.g. "Patient".
    pub name: String,

    /// Identifier written as the envelope `component`.
    #[serde(default)]
    pub route_id: Option<String>,

    /// Path segment under the ingress prefix.
    #[serde(default)]
    pub ingress_path: Option<String>,

    /// Topic the raw body is published to.
    #[serde(default)]
    pub resource_topic: Option<String>,

    /// Path segment appended to the vendor base URI.
    #[serde(default)]
    pub backend_path_segment: Option<String>,

    #[serde(default = "default_true")]
    pub forward_to_backend: bool,

    #[serde(default = "default_true")]
    pub audit_response: bool,

    /// Topic the backend response is published to, if any.
    #[serde(default)]
    pub response_topic: Option<String>,
}

impl ResourceConfig {
    /// A row with every optional field derived from the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            route_id: None,
            ingress_path: None,
            resource_topic: None,
            backend_path_segment: None,
            forward_to_backend: true,
            audit_response: true,
            response_topic: None,
        }
    }
}

fn default_true() -> bool {
    true
}
