//! Audit envelope construction.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AuditConfig;
use crate::routing::ResourceDefinition;

/// Written in place of a body that carried no bytes.
pub const EMPTY_BODY_SNAPSHOT: &str = "(empty body)";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S:%3f";

/// Which side of the exchange an envelope describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessName {
    Input,
    Response,
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessName::Input => write!(f, "Input"),
            ProcessName::Response => write!(f, "Response"),
        }
    }
}

/// One audit record for the operations topic.
///
/// Every field is a string so the serialized record is a flat key/value map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEnvelope {
    pub processed_date: String,
    pub processed_time: String,
    pub processing_type: String,
    pub industry_standard: String,
    pub component: String,
    pub message_trigger: String,
    pub process_name: String,
    pub audit_details: String,
    pub pipeline_run_id: String,
    pub exchange_id: String,
    pub message_id: String,
    pub body_snapshot: String,
}

impl AuditEnvelope {
    /// Encode as a JSON object.
    pub fn to_record(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Builds envelopes with the process-wide fields already filled in.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    processing_type: String,
    industry_standard: String,
    pipeline_run_id: String,
}

impl EnvelopeBuilder {
    pub fn new(config: &AuditConfig, pipeline_run_id: impl Into<String>) -> Self {
        Self {
            processing_type: config.processing_type.clone(),
            industry_standard: config.industry_standard.clone(),
            pipeline_run_id: pipeline_run_id.into(),
        }
    }

    pub fn pipeline_run_id(&self) -> &str {
        &self.pipeline_run_id
    }

    /// Envelope for a successful stage, with the standard details text.
    pub fn build(
        &self,
        resource: &ResourceDefinition,
        exchange_id: &str,
        process: ProcessName,
        body: &[u8],
    ) -> AuditEnvelope {
        let details = match process {
            ProcessName::Input => format!("{} message received", resource.name),
            ProcessName::Response => format!("{} response message received", resource.name),
        };
        self.build_at(Local::now(), resource, exchange_id, process, body, details)
    }

    /// Response envelope describing a failed backend call.
    pub fn build_failure(
        &self,
        resource: &ResourceDefinition,
        exchange_id: &str,
        body: &[u8],
        reason: &str,
    ) -> AuditEnvelope {
        let details = format!("{} response failed: {}", resource.name, reason);
        self.build_at(
            Local::now(),
            resource,
            exchange_id,
            ProcessName::Response,
            body,
            details,
        )
    }

    fn build_at(
        &self,
        at: DateTime<Local>,
        resource: &ResourceDefinition,
        exchange_id: &str,
        process: ProcessName,
        body: &[u8],
        details: String,
    ) -> AuditEnvelope {
        AuditEnvelope {
            processed_date: at.format(DATE_FORMAT).to_string(),
            processed_time: at.format(TIME_FORMAT).to_string(),
            processing_type: self.processing_type.clone(),
            industry_standard: self.industry_standard.clone(),
            component: resource.route_id.clone(),
            message_trigger: resource.name.clone(),
            process_name: process.to_string(),
            audit_details: details,
            pipeline_run_id: self.pipeline_run_id.clone(),
            exchange_id: exchange_id.to_string(),
            message_id: Uuid::new_v4().to_string(),
            body_snapshot: body_snapshot(body),
        }
    }
}

fn body_snapshot(body: &[u8]) -> String {
    if body.is_empty() {
        EMPTY_BODY_SNAPSHOT.to_string()
    } else {
        String::from_utf8_lossy(body).into_owned()
    }
}
