use thiserror::Error;

use crate::backend::BackendError;
use crate::broker::PublishError;
use crate::pipeline::exchange::Stage;

/// A body or envelope could not be put on the wire.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("{resource} body is not valid UTF-8: {source}")]
    NotUtf8 {
        resource: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("audit envelope could not be encoded: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// Why an exchange ended in `FAILED`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A required (awaited) publish failed.
    #[error("required publish to '{topic}' failed: {source}")]
    Publish {
        topic: String,
        #[source]
        source: PublishError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid stage transition {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ProcessName;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Publish {
            topic: "fhirsvr_patient".into(),
            source: PublishError::Connect("refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "required publish to 'fhirsvr_patient' failed: broker connection failed: refused"
        );

        let err = PipelineError::InvalidTransition {
            from: Stage::Received,
            to: Stage::Audited(ProcessName::Input),
        };
        assert_eq!(err.to_string(), "invalid stage transition RECEIVED -> AUDITED(Input)");

        let err: PipelineError = BackendError::Timeout(30).into();
        assert_eq!(err.to_string(), "backend call timed out after 30 seconds");
    }
}
