//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve the active vendor against the configured base URIs
//! - Enforce resource table invariants (unique topics, paths and route ids)
//! - Reject rows whose flags contradict each other
//! - Keep the backend deadline inside the request deadline
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BrokerKind, FhirServerConfig, RelayConfig, ResourceConfig};
use crate::routing::ResourceDefinition;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("ingress path prefix '{0}' must start with '/' and not end with '/'")]
    InvalidPathPrefix(String),

    #[error("broker url must not be empty")]
    MissingBrokerUrl,

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("active vendor '{vendor}' has no configured base URI (known: {known})")]
    UnknownVendor { vendor: String, known: String },

    #[error("base URI '{uri}' for vendor '{vendor}' is not an absolute http(s) URL")]
    InvalidBaseUri { vendor: String, uri: String },

    #[error("resource list contains an entry with an empty name")]
    UnnamedResource,

    #[error("resource '{resource}' {field} '{value}' must be a bare path segment")]
    InvalidSegment {
        resource: String,
        field: &'static str,
        value: String,
    },

    #[error("topic '{topic}' is used by both '{first}' and '{second}'")]
    DuplicateTopic {
        topic: String,
        first: String,
        second: String,
    },

    #[error("ingress path '{0}' is mapped more than once")]
    DuplicateIngressPath(String),

    #[error("route id '{0}' is used by more than one resource")]
    DuplicateRouteId(String),

    #[error("timeouts.backend_secs ({backend_secs}) must be less than timeouts.request_secs ({request_secs})")]
    BackendTimeoutExceedsRequest { backend_secs: u64, request_secs: u64 },

    #[error("resource '{0}' audits responses but never calls the backend")]
    ResponseAuditWithoutBackend(String),

    #[error("resource '{0}' publishes responses but never calls the backend")]
    ResponsePublishWithoutBackend(String),
}

/// Validate a whole configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_bytes" });
    }

    let prefix = &config.ingress.path_prefix;
    if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
        errors.push(ValidationError::InvalidPathPrefix(prefix.clone()));
    }

    if config.broker.kind == BrokerKind::Nats && config.broker.url.trim().is_empty() {
        errors.push(ValidationError::MissingBrokerUrl);
    }

    if config.audit.topic.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "audit.topic" });
    }
    if config.audit.processing_type.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "audit.processing_type" });
    }
    if config.audit.industry_standard.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "audit.industry_standard" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    } else if config.timeouts.backend_secs > 0
        && config.timeouts.backend_secs >= config.timeouts.request_secs
    {
        errors.push(ValidationError::BackendTimeoutExceedsRequest {
            backend_secs: config.timeouts.backend_secs,
            request_secs: config.timeouts.request_secs,
        });
    }

    if config.audit.queue_capacity == 0 {
        errors.push(ValidationError::Zero { field: "audit.queue_capacity" });
    }
    if config.audit.max_in_flight == 0 {
        errors.push(ValidationError::Zero { field: "audit.max_in_flight" });
    }

    if let Err(e) = validate_vendor(&config.fhir) {
        errors.push(e);
    }

    if let Err(mut e) = validate_resources(&config.resource_configs(), &config.audit.topic) {
        errors.append(&mut e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that the active vendor resolves to a usable base URI.
pub fn validate_vendor(fhir: &FhirServerConfig) -> Result<(), ValidationError> {
    let vendor = &fhir.vendor;
    let uri = fhir
        .servers
        .get(vendor)
        .ok_or_else(|| ValidationError::UnknownVendor {
            vendor: vendor.clone(),
            known: fhir
                .servers
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    match Url::parse(uri) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ValidationError::InvalidBaseUri {
            vendor: vendor.clone(),
            uri: uri.clone(),
        }),
    }
}

/// Check the resource rows against the table invariants.
///
/// `operations_topic` is reserved and may not be reused by any resource.
pub fn validate_resources(
    rows: &[ResourceConfig],
    operations_topic: &str,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut topics: Vec<(String, String)> = vec![(
        operations_topic.to_string(),
        "operations".to_string(),
    )];
    let mut paths = HashSet::new();
    let mut route_ids = HashSet::new();

    for row in rows {
        if row.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedResource);
            continue;
        }
        let def = ResourceDefinition::from_config(row);

        for (field, value) in [
            ("ingress_path", &def.ingress_path),
            ("backend_path_segment", &def.backend_path_segment),
        ] {
            if !is_bare_segment(value) {
                errors.push(ValidationError::InvalidSegment {
                    resource: def.name.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }

        if !paths.insert(def.ingress_path.to_lowercase()) {
            errors.push(ValidationError::DuplicateIngressPath(def.ingress_path.clone()));
        }
        if def.route_id.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "route_id" });
        } else if !route_ids.insert(def.route_id.clone()) {
            errors.push(ValidationError::DuplicateRouteId(def.route_id.clone()));
        }

        let mut owned = vec![def.resource_topic.clone()];
        owned.extend(def.response_topic.clone());
        for topic in owned {
            if topic.trim().is_empty() {
                errors.push(ValidationError::Empty { field: "resource topic" });
                continue;
            }
            if let Some((_, first)) = topics.iter().find(|(t, _)| *t == topic) {
                errors.push(ValidationError::DuplicateTopic {
                    topic: topic.clone(),
                    first: first.clone(),
                    second: def.name.clone(),
                });
            } else {
                topics.push((topic, def.name.clone()));
            }
        }

        if def.audit_response && !def.forward_to_backend {
            errors.push(ValidationError::ResponseAuditWithoutBackend(def.name.clone()));
        }
        if def.response_topic.is_some() && !def.forward_to_backend {
            errors.push(ValidationError::ResponsePublishWithoutBackend(def.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A single URL path segment: no separators, no scheme, no whitespace.
fn is_bare_segment(value: &str) -> bool {
    !value.is_empty()
        && !value.contains('/')
        && !value.contains(':')
        && !value.contains('?')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn test_unknown_vendor() {
        let mut config = RelayConfig::default();
        config.fhir.vendor = "acme".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ValidationError::UnknownVendor { vendor, .. }] if vendor == "acme"
        ));
    }

    #[test]
    fn test_relative_base_uri() {
        let mut config = RelayConfig::default();
        config.fhir.servers.insert("hapi".into(), "localhost/fhir".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBaseUri { .. }));
    }

    #[test]
    fn test_inactive_vendor_uri_is_not_checked() {
        let mut config = RelayConfig::default();
        config.fhir.servers.insert("ibm".into(), "not a url".into());
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_duplicate_topics() {
        let mut claim = ResourceConfig::named("Claim");
        claim.resource_topic = Some("fhirsvr_claims".into());
        let mut other = ResourceConfig::named("ClaimResponse");
        other.resource_topic = Some("fhirsvr_claims".into());

        let errors = validate_resources(&[claim, other], "ops").unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateTopic {
                topic: "fhirsvr_claims".into(),
                first: "Claim".into(),
                second: "ClaimResponse".into(),
            }]
        );
    }

    #[test]
    fn test_resource_cannot_reuse_operations_topic() {
        let mut row = ResourceConfig::named("Patient");
        row.resource_topic = Some("ops".into());
        let errors = validate_resources(&[row], "ops").unwrap_err();
        assert!(matches!(errors[0], ValidationError::DuplicateTopic { .. }));
    }

    #[test]
    fn test_absolute_url_in_ingress_path() {
        let mut row = ResourceConfig::named("Coverage");
        row.ingress_path = Some("http://localhost:8080/coverage".into());
        let errors = validate_resources(&[row], "ops").unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidSegment { field: "ingress_path", .. }
        ));
    }

    #[test]
    fn test_duplicate_route_id() {
        let mut a = ResourceConfig::named("Measure");
        a.route_id = Some("FHIRMeasure".into());
        let mut b = ResourceConfig::named("MeasureReport");
        b.route_id = Some("FHIRMeasure".into());
        let errors = validate_resources(&[a, b], "ops").unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateRouteId("FHIRMeasure".into())]);
    }

    #[test]
    fn test_blank_route_id() {
        let mut row = ResourceConfig::named("Encounter");
        row.route_id = Some("".into());
        let mut other = ResourceConfig::named("Observation");
        other.route_id = Some("  ".into());
        let errors = validate_resources(&[row, other], "ops").unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Empty { field: "route_id" },
                ValidationError::Empty { field: "route_id" },
            ]
        );
    }

    #[test]
    fn test_blank_route_id_fails_config() {
        let mut row = ResourceConfig::named("Patient");
        row.route_id = Some("".into());
        let mut config = RelayConfig::default();
        config.resources = vec![row];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Empty { field: "route_id" }]);
    }

    #[test]
    fn test_backend_timeout_must_fit_request_timeout() {
        let mut config = RelayConfig::default();
        config.timeouts.request_secs = 10;
        config.timeouts.backend_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BackendTimeoutExceedsRequest {
                backend_secs: 10,
                request_secs: 10,
            }]
        );

        config.timeouts.backend_secs = 0;
        assert_eq!(validate_config(&config), Ok(()));
        config.timeouts.backend_secs = 9;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_response_audit_requires_backend() {
        let mut row = ResourceConfig::named("Consent");
        row.forward_to_backend = false;
        let errors = validate_resources(&[row.clone()], "ops").unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ResponseAuditWithoutBackend("Consent".into())]
        );

        row.audit_response = false;
        assert_eq!(validate_resources(&[row], "ops"), Ok(()));
    }

    #[test]
    fn test_response_topic_requires_backend() {
        let mut row = ResourceConfig::named("Consent");
        row.forward_to_backend = false;
        row.audit_response = false;
        row.response_topic = Some("fhirsvr_consent_response".into());
        let errors = validate_resources(&[row], "ops").unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ResponsePublishWithoutBackend("Consent".into())]
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.ingress.path_prefix = "iDAAS/".into();
        config.audit.queue_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
