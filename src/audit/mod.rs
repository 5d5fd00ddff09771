//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stage (Input / Response / failure)
//!     → envelope.rs (pure: body + stage + route metadata → AuditEnvelope)
//!     → relay.rs (encode, try_send onto bounded queue, return immediately)
//!     → worker task → TopicPublisher (operations topic)
//! ```
//!
//! # Design Decisions
//! - Wire-tap semantics: the pipeline never waits on an audit publish
//! - Backpressure drops envelopes instead of stalling ingress
//! - No ordering between audits and the resource publish

pub mod envelope;
pub mod relay;

pub use envelope::{AuditEnvelope, EnvelopeBuilder, ProcessName};
pub use relay::{AuditQueue, AuditRelay, RelayOutcome};
