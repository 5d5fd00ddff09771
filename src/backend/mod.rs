//! Backend dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     FhirServerConfig (vendor → base URI)
//!     → vendor.rs (resolve active vendor, fatal if unconfigured)
//!     → ActiveBackend (immutable, owned by the dispatcher)
//!
//! Per forwarded exchange:
//!     ResourceDefinition + body
//!     → dispatcher.rs (baseURI + segment, JSON content type)
//!     → BackendResponse | BackendError
//! ```
//!
//! # Design Decisions
//! - Vendor selection is a value passed into the dispatcher, never global state
//! - The dispatcher is a trait so resilience wrappers and test doubles compose over it

pub mod dispatcher;
pub mod vendor;

pub use dispatcher::{
    BackendDispatcher, BackendError, BackendRequest, BackendResponse, HttpDispatcher,
};
pub use vendor::ActiveBackend;
