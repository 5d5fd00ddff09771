//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: one ingress route per resource under the prefix
//! - Mount the operational endpoints outside the prefix
//! - Wire up middleware (request id, tracing, limits, timeout)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware::map_request,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::handlers::{health, list_resources};
use crate::backend::ActiveBackend;
use crate::config::RelayConfig;
use crate::http::request::{self, discard_unusable_request_id, make_request_span, x_request_id};
use crate::http::response::error_response;
use crate::pipeline::{Ingress, ResourcePipeline};
use crate::routing::ResourceTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResourcePipeline>,
    pub resources: Arc<ResourceTable>,
    pub backend: ActiveBackend,
}

/// HTTP ingress server for the relay.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &RelayConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let prefix = config.ingress.path_prefix.trim_end_matches('/');
        let ingress_route = format!("{prefix}/{{resource}}");

        tracing::debug!(route = %ingress_route, resources = state.resources.len(), "Mounting ingress");

        Router::new()
            .route("/health", get(health))
            .route("/admin/resources", get(list_resources))
            .route(&ingress_route, any(ingress_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::new(x_request_id()))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(SetRequestIdLayer::new(x_request_id(), MakeRequestUuid))
            .layer(map_request(discard_unusable_request_id))
    }

    /// The fully layered router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then finish in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resource ingress handler: look up the resource and run the pipeline.
async fn ingress_handler(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let exchange_id = request::exchange_id(&headers);

    let Some(resource) = state.resources.match_ingress(&segment) else {
        tracing::warn!(exchange_id = %exchange_id, segment = %segment, "No resource mounted");
        return error_response(
            StatusCode::NOT_FOUND,
            "unknown_resource",
            format!("no resource mounted at '{segment}'"),
        );
    };

    let ingress = Ingress {
        method,
        query: uri.query().map(str::to_string),
        body,
        exchange_id,
    };

    match state.pipeline.process(&resource, ingress).await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => e.into_response(),
    }
}
