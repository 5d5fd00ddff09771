//! Outbound calls to the backend FHIR server.
//!
//! # Responsibilities
//! - Issue one request/response call per forwarded exchange
//! - Declare JSON content type and pass the body through unmodified
//! - Classify failures (unreachable, non-2xx, transport)
//!
//! # Design Decisions
//! - No retry or backoff; a single failed attempt is returned immediately
//! - No timeout here; see `resilience::timeouts` for the wrapper
//! - The HTTP client pool is shared by all exchanges

use std::fmt;

use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use bytes::Bytes;
use thiserror::Error;

use crate::backend::vendor::ActiveBackend;
use crate::routing::ResourceDefinition;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// What the pipeline hands to the dispatcher.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Ingress method, passed through.
    pub method: Method,
    /// Ingress query string, without the leading '?'.
    pub query: Option<String>,
    pub body: Bytes,
    /// Propagated as `x-request-id`.
    pub exchange_id: String,
}

/// A successful (2xx) backend reply.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Errors that can occur during a backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection could not be established.
    #[error("backend {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// Backend answered with a non-success status.
    #[error("backend {url} returned {status}")]
    Status {
        url: String,
        status: StatusCode,
        body: Bytes,
    },

    /// Round trip exceeded the configured deadline.
    #[error("backend call timed out after {0} seconds")]
    Timeout(u64),

    /// Request or response body failed in transit.
    #[error("backend call to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The ingress call went away while the backend call was in flight.
    #[error("backend call cancelled")]
    Cancelled,
}

impl BackendError {
    /// Body worth recording in a failure audit, if the backend sent one.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            BackendError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Forwards an exchange to the active backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendDispatcher: Send + Sync {
    async fn forward(
        &self,
        resource: &ResourceDefinition,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError>;
}

/// HTTP implementation over a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    backend: ActiveBackend,
}

impl fmt::Debug for HttpDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("backend", &self.backend)
            .finish()
    }
}

impl HttpDispatcher {
    pub fn new(backend: ActiveBackend) -> Self {
        Self::with_client(backend, reqwest::Client::new())
    }

    pub fn with_client(backend: ActiveBackend, client: reqwest::Client) -> Self {
        Self { client, backend }
    }

    /// Full target URL including the passed-through query string.
    pub fn target_url(&self, resource: &ResourceDefinition, query: Option<&str>) -> String {
        let url = self.backend.resource_url(resource);
        match query {
            Some(q) if !q.is_empty() => format!("{url}?{q}"),
            _ => url,
        }
    }
}

#[async_trait]
impl BackendDispatcher for HttpDispatcher {
    async fn forward(
        &self,
        resource: &ResourceDefinition,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError> {
        let url = self.target_url(resource, request.query.as_deref());

        tracing::debug!(
            exchange_id = %request.exchange_id,
            method = %request.method,
            url = %url,
            size_bytes = request.body.len(),
            "Forwarding to backend"
        );

        let response = self
            .client
            .request(request.method, &url)
            .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("x-request-id", request.exchange_id.as_str())
            .body(request.body)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| classify(&url, e))?;

        if !status.is_success() {
            return Err(BackendError::Status { url, status, body });
        }

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }
}

fn classify(url: &str, error: reqwest::Error) -> BackendError {
    if error.is_connect() {
        BackendError::Unreachable {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        BackendError::Transport {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
