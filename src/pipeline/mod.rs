//! Resource ingress pipeline.
//!
//! # Data Flow
//! ```text
//! RECEIVED
//!   → ENVELOPED(Input) → AUDITED(Input)          (audit relay, not awaited)
//!   → RESOURCE_PUBLISHED                         (resource topic, awaited)
//!   → [FORWARDING → FORWARDED | FAILED]          (forward_to_backend)
//!   → [ENVELOPED(Response) → AUDITED(Response)]  (audit_response)
//!   → [RESPONSE_PUBLISHED]                       (response_topic)
//!   → COMPLETE
//! ```
//!
//! # Design Decisions
//! - One engine for every resource, parameterised by `ResourceDefinition`
//! - A backend failure still produces a Response audit, marked as failed
//! - No retries; the first failure ends the exchange

pub mod engine;
pub mod error;
pub mod exchange;

pub use engine::{Ingress, PipelineOutcome, ResourcePipeline};
pub use error::{PipelineError, SerializationError};
pub use exchange::{InFlightExchange, Stage};
