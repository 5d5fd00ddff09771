//! Resource lookup by ingress path.
//!
//! # Responsibilities
//! - Store the compiled resource definitions
//! - Look up the definition for an ingress path segment
//! - Return the matched definition or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup via HashMap, case-insensitive on the segment
//! - Table order is preserved for listing

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::validation::validate_resources;
use crate::config::{ConfigError, ResourceConfig};
use crate::routing::ResourceDefinition;

/// The process-wide resource table.
#[derive(Debug)]
pub struct ResourceTable {
    definitions: Vec<Arc<ResourceDefinition>>,
    by_ingress: HashMap<String, usize>,
}

impl ResourceTable {
    /// Compile the table, enforcing the table invariants.
    pub fn build(rows: &[ResourceConfig], operations_topic: &str) -> Result<Self, ConfigError> {
        validate_resources(rows, operations_topic).map_err(ConfigError::Validation)?;

        let definitions: Vec<Arc<ResourceDefinition>> = rows
            .iter()
            .map(|row| Arc::new(ResourceDefinition::from_config(row)))
            .collect();

        let by_ingress = definitions
            .iter()
            .enumerate()
            .map(|(i, def)| (def.ingress_path.to_lowercase(), i))
            .collect();

        tracing::debug!(resources = definitions.len(), "Resource table compiled");

        Ok(Self {
            definitions,
            by_ingress,
        })
    }

    /// Find the resource mounted at `segment`.
    pub fn match_ingress(&self, segment: &str) -> Option<Arc<ResourceDefinition>> {
        self.by_ingress
            .get(&segment.to_lowercase())
            .map(|&i| self.definitions[i].clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceDefinition>> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Every topic any resource publishes to, in table order.
    pub fn topics(&self) -> Vec<String> {
        self.definitions
            .iter()
            .flat_map(|d| d.topics().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}
