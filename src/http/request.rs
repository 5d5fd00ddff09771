//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header
//! - Read the exchange id set by the request-id layer
//! - Build the per-request tracing span
//!
//! # Design Decisions
//! - The request id doubles as the exchange id written into audit envelopes
//! - A client-supplied `x-request-id` is kept, otherwise a UUID v4 is generated
//! - A blank or non-ASCII client id is discarded before the request-id layer
//!   runs, so the id echoed to the client is the one written into audits

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tracing::Span;
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

pub fn x_request_id() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Exchange id for this request.
///
/// Falls back to a fresh UUID if the header is missing or not visible ASCII,
/// which only happens when the router is used without its layers.
pub fn exchange_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_usable(v))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Remove an incoming `x-request-id` that cannot serve as an exchange id.
///
/// Runs ahead of `SetRequestIdLayer`, which only fills in a missing header.
pub async fn discard_unusable_request_id(mut request: Request<Body>) -> Request<Body> {
    let usable = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_usable);
    if !usable {
        request.headers_mut().remove(X_REQUEST_ID);
    }
    request
}

fn is_usable(id: &str) -> bool {
    !id.trim().is_empty()
}

/// Span for `TraceLayer`, carrying the request id.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
