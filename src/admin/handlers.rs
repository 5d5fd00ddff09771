use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::routing::ResourceDefinition;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub vendor: String,
    pub base_uri: String,
    pub resources: usize,
    pub pipeline_run_id: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        vendor: state.backend.vendor().to_string(),
        base_uri: state.backend.base_uri().to_string(),
        resources: state.resources.len(),
        pipeline_run_id: state.pipeline.pipeline_run_id().to_string(),
    })
}

/// The resource table, in configuration order.
pub async fn list_resources(State(state): State<AppState>) -> Json<Vec<ResourceDefinition>> {
    Json(state.resources.iter().map(|d| d.as_ref().clone()).collect())
}
