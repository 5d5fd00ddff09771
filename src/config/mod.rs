//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI / environment overrides (broker url, active vendor)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path, so the active
//!   vendor can never change under a running process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::AuditConfig;
pub use schema::BrokerConfig;
pub use schema::BrokerKind;
pub use schema::FhirServerConfig;
pub use schema::ListenerConfig;
pub use schema::RelayConfig;
pub use schema::ResourceConfig;
pub use validation::{validate_config, ValidationError};
