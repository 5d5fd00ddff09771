//! HTTP ingress subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, limits, request id, tracing)
//!     → request.rs (exchange id from x-request-id)
//!     → ResourceTable lookup → ResourcePipeline::process
//!     → response.rs (202 / backend passthrough / error status)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
