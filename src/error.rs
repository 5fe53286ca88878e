//! Error taxonomy for the generation pipeline
//!
//! Provider-level failures are absorbed at the orchestrator boundary and
//! surfaced only as one of the kinds below. Transient kinds are retried
//! with backoff; fatal kinds stop the request immediately.

use thiserror::Error;

/// Typed failure surfaced to callers of the pipeline
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// Capability call exceeded its configured deadline
    #[error("provider call timed out during {stage}")]
    ProviderTimeout { stage: &'static str },

    /// Capability provider was unreachable or returned a server error
    #[error("provider unavailable during {stage}: {detail}")]
    ProviderUnavailable { stage: &'static str, detail: String },

    /// Provider returned output failing basic shape validation
    /// (empty description, missing artifact, unparseable ranking)
    #[error("invalid agent output during {stage}: {detail}")]
    InvalidAgentOutput { stage: &'static str, detail: String },

    /// Provider refused the prompt. Fatal for the request, never retried.
    #[error("content policy rejection during {stage}")]
    ContentPolicyRejected { stage: &'static str },

    /// Request parameters failed validation before any provider call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Request was cancelled at an inter-iteration checkpoint before any
    /// iteration completed
    #[error("generation cancelled")]
    Cancelled,

    /// Local I/O failure writing an artifact or history document
    #[error("artifact io failure during {stage}: {detail}")]
    ArtifactIo { stage: &'static str, detail: String },
}

impl GenerateError {
    /// Whether the retry policy applies to this failure.
    ///
    /// `InvalidAgentOutput` is retryable but the orchestrator caps it at a
    /// single retry, tighter than the transient ceiling.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. }
                | Self::ProviderUnavailable { .. }
                | Self::InvalidAgentOutput { .. }
        )
    }

    /// Whether this failure aborts the whole request with no partial result
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContentPolicyRejected { .. } | Self::Configuration(_) | Self::Cancelled
        )
    }

    /// Short kind tag recorded in the history's terminal note
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::InvalidAgentOutput { .. } => "invalid_agent_output",
            Self::ContentPolicyRejected { .. } => "content_policy_rejected",
            Self::Configuration(_) => "configuration_error",
            Self::Cancelled => "cancelled",
            Self::ArtifactIo { .. } => "artifact_io",
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(GenerateError::ProviderTimeout { stage: "planning" }.is_retryable());
        assert!(GenerateError::ProviderUnavailable {
            stage: "rendering",
            detail: "503".into()
        }
        .is_retryable());
        assert!(!GenerateError::ContentPolicyRejected { stage: "planning" }.is_retryable());
    }

    #[test]
    fn fatal_kinds_are_not_retryable() {
        let err = GenerateError::Configuration("max_iterations must be positive".into());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "configuration_error");
    }
}
