//! Operational endpoints.
//!
//! Mounted by `http::server` outside the ingress prefix:
//! - `GET /health`: liveness plus the active vendor and pipeline run id
//! - `GET /admin/resources`: the resource table as JSON

pub mod handlers;

pub use handlers::{health, list_resources, HealthStatus};
