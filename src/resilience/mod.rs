//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline FORWARDING stage:
//!     → timeouts.rs (deadline around the dispatcher)
//!     → HttpDispatcher (single attempt)
//! ```
//!
//! # Design Decisions
//! - Every backend call has a deadline unless explicitly disabled
//! - No retries or circuit breaking; a failure is reported once
//! - Wrappers are dispatchers themselves, so they compose

pub mod timeouts;

pub use timeouts::TimeoutDispatcher;
