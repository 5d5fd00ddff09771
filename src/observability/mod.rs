//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty, compact or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The exchange id (`x-request-id`) is a field on every pipeline event
//! - Metric updates are free when no exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
