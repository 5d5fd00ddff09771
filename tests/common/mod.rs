//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use fhir_relay::backend::ActiveBackend;
use fhir_relay::broker::MemoryPublisher;
use fhir_relay::config::{BrokerKind, RelayConfig};
use fhir_relay::http::HttpServer;
use fhir_relay::lifecycle::{assemble, Shutdown};
use fhir_relay::routing::ResourceTable;

/// A request seen by the mock FHIR server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: Bytes,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: &'static str,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Handle on a running mock FHIR server.
pub struct MockFhirServer {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockFhirServer {
    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

/// Start a mock FHIR server that answers every request with `status` and `body`.
pub async fn start_fhir_backend(status: u16, body: &'static str) -> MockFhirServer {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        captured: captured.clone(),
    };

    let app = Router::new().fallback(capture).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockFhirServer { addr, captured }
}

async fn capture(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.captured.lock().unwrap().push(CapturedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        content_type: get("content-type"),
        request_id: get("x-request-id"),
        body,
    });

    (
        state.status,
        [(header::CONTENT_TYPE, "application/fhir+json")],
        state.body,
    )
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config with the in-memory broker and `hapi` at `hapi_base`.
pub fn relay_config(hapi_base: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.broker.kind = BrokerKind::Memory;
    config.observability.metrics_enabled = false;
    config.timeouts.backend_secs = 5;
    config
        .fhir
        .servers
        .insert("hapi".to_string(), hapi_base.to_string());
    config
}

/// A relay running on an ephemeral port.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub broker: Arc<MemoryPublisher>,
    audit_topic: String,
    shutdown: Shutdown,
    server: JoinHandle<Result<(), std::io::Error>>,
    audit_worker: JoinHandle<()>,
}

impl RelayHandle {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the relay, wait for the audit queue to drain, return the audit records.
    pub async fn finish(self) -> Vec<serde_json::Value> {
        self.shutdown.trigger();
        self.server.await.unwrap().unwrap();
        self.audit_worker.await.unwrap();

        self.broker
            .published_to(&self.audit_topic)
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect()
    }
}

/// Start the relay with `config`, publishing into an inspectable memory broker.
pub async fn start_relay(config: RelayConfig) -> RelayHandle {
    let resources = ResourceTable::build(&config.resource_configs(), &config.audit.topic).unwrap();
    let backend = ActiveBackend::resolve(&config.fhir).unwrap();
    let broker = Arc::new(MemoryPublisher::new(1000));
    let services = assemble(&config, resources, backend, broker.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(&config, services.state);
    let server = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    RelayHandle {
        addr,
        broker,
        audit_topic: config.audit.topic.clone(),
        shutdown,
        server,
        audit_worker: services.audit_worker,
    }
}

/// Client without connection pooling so graceful shutdown is not held open.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
