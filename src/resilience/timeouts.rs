//! Timeout enforcement for backend calls.
//!
//! # Responsibilities
//! - Wrap any dispatcher with a per-call deadline
//! - Drop the inner call cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other backend errors (504, not 502)

use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BackendDispatcher, BackendError, BackendRequest, BackendResponse};
use crate::routing::ResourceDefinition;

/// Fails a backend call with [`BackendError::Timeout`] after `timeout`.
pub struct TimeoutDispatcher<D> {
    inner: D,
    timeout: Duration,
}

impl<D: BackendDispatcher> TimeoutDispatcher<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<D: BackendDispatcher> BackendDispatcher for TimeoutDispatcher<D> {
    async fn forward(
        &self,
        resource: &ResourceDefinition,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError> {
        let exchange_id = request.exchange_id.clone();
        match tokio::time::timeout(self.timeout, self.inner.forward(resource, request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    exchange_id = %exchange_id,
                    resource = %resource.name,
                    timeout_secs = self.timeout.as_secs(),
                    "Backend call timed out"
                );
                Err(BackendError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}
