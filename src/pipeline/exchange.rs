//! Per-request exchange state.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::audit::ProcessName;
use crate::pipeline::error::PipelineError;
use crate::routing::ResourceDefinition;

/// Where an exchange is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Enveloped(ProcessName),
    Audited(ProcessName),
    ResourcePublished,
    Forwarding,
    Forwarded,
    ResponsePublished,
    Complete,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use ProcessName::{Input, Response};
        use Stage::*;

        match (self, next) {
            (Received, Enveloped(Input)) | (Received, Failed) => true,
            (Enveloped(p), Audited(q)) => p == q,
            (Enveloped(_), Failed) => true,
            (Audited(Input), ResourcePublished) | (Audited(Input), Failed) => true,
            (ResourcePublished, Forwarding) | (ResourcePublished, Complete) => true,
            (Forwarding, Forwarded) | (Forwarding, Failed) => true,
            (Forwarded, Enveloped(Response))
            | (Forwarded, ResponsePublished)
            | (Forwarded, Complete)
            | (Forwarded, Failed) => true,
            (Audited(Response), ResponsePublished)
            | (Audited(Response), Complete)
            | (Audited(Response), Failed) => true,
            (ResponsePublished, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => write!(f, "RECEIVED"),
            Stage::Enveloped(p) => write!(f, "ENVELOPED({p})"),
            Stage::Audited(p) => write!(f, "AUDITED({p})"),
            Stage::ResourcePublished => write!(f, "RESOURCE_PUBLISHED"),
            Stage::Forwarding => write!(f, "FORWARDING"),
            Stage::Forwarded => write!(f, "FORWARDED"),
            Stage::ResponsePublished => write!(f, "RESPONSE_PUBLISHED"),
            Stage::Complete => write!(f, "COMPLETE"),
            Stage::Failed => write!(f, "FAILED"),
        }
    }
}

/// One ingress call on its way through the pipeline.
///
/// Owned by a single pipeline run and discarded at a terminal stage.
#[derive(Debug)]
pub struct InFlightExchange {
    exchange_id: String,
    resource: Arc<ResourceDefinition>,
    body: Bytes,
    stage: Stage,
}

impl InFlightExchange {
    pub fn new(exchange_id: impl Into<String>, resource: Arc<ResourceDefinition>, body: Bytes) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            resource,
            body,
            stage: Stage::Received,
        }
    }

    pub fn exchange_id(&self) -> &str {
        &self.exchange_id
    }

    pub fn resource(&self) -> &Arc<ResourceDefinition> {
        &self.resource
    }

    /// Current body: the ingress body until forwarded, then the backend's.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn replace_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, next: Stage) -> Result<(), PipelineError> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        tracing::trace!(
            exchange_id = %self.exchange_id,
            resource = %self.resource.name,
            from = %self.stage,
            to = %next,
            "Exchange advanced"
        );
        self.stage = next;
        Ok(())
    }
}
