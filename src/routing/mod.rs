//! Resource routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (prefix + segment)
//!     → router.rs (resource lookup)
//!     → Return: matched ResourceDefinition or NoMatch
//!
//! Table compilation (at startup):
//!     ResourceConfig[] (or catalog.rs when none configured)
//!     → validation (unique topics, paths, route ids)
//!     → definition.rs (derive omitted fields)
//!     → Freeze as immutable ResourceTable
//! ```
//!
//! # Design Decisions
//! - Resources are table rows, not code paths; one pipeline serves them all
//! - Table compiled at startup, immutable at runtime
//! - Deterministic: same segment always matches the same resource

pub mod catalog;
pub mod definition;
pub mod router;

pub use definition::ResourceDefinition;
pub use router::ResourceTable;
