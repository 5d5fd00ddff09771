//! A single supported resource.

use serde::Serialize;

use crate::config::ResourceConfig;

/// Prefix of every derived resource topic.
pub const RESOURCE_TOPIC_PREFIX: &str = "fhirsvr_";

/// Immutable description of one resource route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDefinition {
    /// Resource type, written as the envelope `messageTrigger`.
    pub name: String,
    /// Written as the envelope `component`.
    pub route_id: String,
    /// Path segment under the ingress prefix.
    pub ingress_path: String,
    pub resource_topic: String,
    /// Appended to the active vendor's base URI.
    pub backend_path_segment: String,
    pub forward_to_backend: bool,
    pub audit_response: bool,
    pub response_topic: Option<String>,
}

impl ResourceDefinition {
    /// Build a definition, deriving every omitted field from the resource name.
    pub fn from_config(config: &ResourceConfig) -> Self {
        let name = config.name.trim().to_string();
        let lower = name.to_lowercase();

        Self {
            route_id: config
                .route_id
                .clone()
                .unwrap_or_else(|| format!("fhir-{lower}")),
            ingress_path: config.ingress_path.clone().unwrap_or_else(|| lower.clone()),
            resource_topic: config
                .resource_topic
                .clone()
                .unwrap_or_else(|| format!("{RESOURCE_TOPIC_PREFIX}{lower}")),
            backend_path_segment: config
                .backend_path_segment
                .clone()
                .unwrap_or_else(|| name.clone()),
            forward_to_backend: config.forward_to_backend,
            audit_response: config.audit_response,
            response_topic: config.response_topic.clone(),
            name,
        }
    }

    /// Every topic this resource publishes to.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.resource_topic.as_str()).chain(self.response_topic.as_deref())
    }
}
