//! Active vendor resolution.
//!
//! # Responsibilities
//! - Resolve the configured vendor to its base URI, once, at startup
//! - Compose per-resource backend URLs

use crate::config::validation::validate_vendor;
use crate::config::{ConfigError, FhirServerConfig};
use crate::routing::ResourceDefinition;

/// The vendor selected for this process and its base URI.
///
/// Only obtainable through [`ActiveBackend::resolve`], so holding one means the
/// vendor was configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBackend {
    vendor: String,
    base_uri: String,
}

impl ActiveBackend {
    /// Resolve the active vendor. An unconfigured vendor is a configuration error.
    pub fn resolve(config: &FhirServerConfig) -> Result<Self, ConfigError> {
        validate_vendor(config).map_err(|e| ConfigError::Validation(vec![e]))?;

        // validate_vendor guarantees the entry exists.
        let base_uri = config.servers[&config.vendor]
            .trim_end_matches('/')
            .to_string();

        tracing::info!(vendor = %config.vendor, base_uri = %base_uri, "Backend vendor resolved");

        Ok(Self {
            vendor: config.vendor.clone(),
            base_uri,
        })
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Base URI without a trailing slash.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// `<baseURI>/<backendPathSegment>`.
    pub fn resource_url(&self, resource: &ResourceDefinition) -> String {
        format!("{}/{}", self.base_uri, resource.backend_path_segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;

    fn fhir(vendor: &str, uri: &str) -> FhirServerConfig {
        FhirServerConfig {
            vendor: vendor.to_string(),
            servers: [(vendor.to_string(), uri.to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn test_resource_url() {
        let backend = ActiveBackend::resolve(&fhir("hapi", "http://host:8080/fhir")).unwrap();
        let patient = ResourceDefinition::from_config(&ResourceConfig::named("Patient"));
        assert_eq!(backend.vendor(), "hapi");
        assert_eq!(backend.resource_url(&patient), "http://host:8080/fhir/Patient");
    }

    #[test]
    fn test_trailing_slash_is_normalised() {
        let backend = ActiveBackend::resolve(&fhir("ibm", "http://host:8090/fhir-server/api/v4/"))
            .unwrap();
        let claim = ResourceDefinition::from_config(&ResourceConfig::named("Claim"));
        assert_eq!(
            backend.resource_url(&claim),
            "http://host:8090/fhir-server/api/v4/Claim"
        );
    }

    #[test]
    fn test_unconfigured_vendor_fails() {
        let mut config = fhir("hapi", "http://host:8080/fhir");
        config.vendor = "microsoft".into();
        let err = ActiveBackend::resolve(&config).unwrap_err();
        assert!(err.to_string().contains("microsoft"));
    }
}
