//! FHIR integration relay library.

pub mod admin;
pub mod audit;
pub mod backend;
pub mod broker;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::ResourcePipeline;
