//! Mapping pipeline results onto HTTP responses.
//!
//! # Responsibilities
//! - Pass a forwarded backend reply through (status, content type, body)
//! - Acknowledge publish-only exchanges with 202
//! - Map pipeline errors to status codes
//!
//! # Design Decisions
//! - Backend timeouts are 504, every other backend failure is 502
//! - Broker failures are 503 so callers can retry later

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::backend::BackendError;
use crate::pipeline::{PipelineError, PipelineOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted<'a> {
    status: &'static str,
    exchange_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Build an error response with a JSON body.
pub fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for PipelineOutcome {
    fn into_response(self) -> Response {
        match self {
            PipelineOutcome::Published { exchange_id } => (
                StatusCode::ACCEPTED,
                Json(Accepted {
                    status: "accepted",
                    exchange_id: &exchange_id,
                }),
            )
                .into_response(),
            PipelineOutcome::Forwarded { response, .. } => {
                let mut out = (response.status, response.body).into_response();
                if let Some(value) = response
                    .content_type
                    .as_deref()
                    .and_then(|ct| HeaderValue::from_str(ct).ok())
                {
                    out.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                out
            }
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            PipelineError::Serialization(_) => (StatusCode::BAD_REQUEST, "serialization_error"),
            PipelineError::Publish { .. } => (StatusCode::SERVICE_UNAVAILABLE, "publish_error"),
            PipelineError::Backend(BackendError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "backend_timeout")
            }
            PipelineError::Backend(_) => (StatusCode::BAD_GATEWAY, "backend_error"),
            PipelineError::InvalidTransition { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        error_response(status, error, self.to_string())
    }
}
