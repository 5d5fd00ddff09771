//! Built-in resource catalog.
//!
//! Used when the configuration lists no resources. Every row uses canonical,
//! name-derived paths and topics and both forwards to the backend and audits
//! the response.

use crate::config::ResourceConfig;

/// Clinical and financial resource types supported out of the box.
pub const DEFAULT_RESOURCE_NAMES: [&str; 13] = [
    // Clinical
    "AllergyIntolerance",
    "Condition",
    "Consent",
    "Patient",
    "Problem",
    // Financial
    "Account",
    "Coverage",
    "Claim",
    "ClaimResponse",
    "ExplanationOfBenefits",
    // Research and quality
    "Measure",
    "MeasureReport",
    "ResearchStudy",
];

pub fn default_resources() -> Vec<ResourceConfig> {
    DEFAULT_RESOURCE_NAMES
        .iter()
        .map(|name| ResourceConfig::named(*name))
        .collect()
}
