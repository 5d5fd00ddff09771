//! Relay metrics and Prometheus exposition.
//!
//! # Metrics
//! - `relay_ingress_total` (counter): ingress calls by resource
//! - `relay_topic_publish_total` (counter): required publishes by topic, outcome
//! - `relay_audit_total` (counter): audit envelopes by outcome
//!   (queued, dropped, published, failed)
//! - `relay_exchanges_total` (counter): finished exchanges by resource, outcome
//! - `relay_backend_duration_seconds` (histogram): backend round trip by resource, outcome
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `address`.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;

    tracing::info!(%address, "Metrics server listening");
    Ok(())
}

pub fn record_ingress(resource: &str) {
    counter!("relay_ingress_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_publish(topic: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("relay_topic_publish_total", "topic" => topic.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_audit(outcome: &'static str) {
    counter!("relay_audit_total", "outcome" => outcome).increment(1);
}

pub fn record_exchange(resource: &str, outcome: &'static str) {
    counter!("relay_exchanges_total", "resource" => resource.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_backend(resource: &str, elapsed: Duration, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    histogram!(
        "relay_backend_duration_seconds",
        "resource" => resource.to_string(),
        "outcome" => outcome
    )
    .record(elapsed.as_secs_f64());
}
