use batchscore_core::JobHandle;
use thiserror::Error;

/// Failure of a single platform call.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("submission to {endpoint} rejected: {reason}")]
    SubmissionRejected { endpoint: String, reason: String },

    #[error("job not found: {0}")]
    JobNotFound(JobHandle),

    #[error("output not available for job {0}")]
    OutputUnavailable(JobHandle),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("invalid platform configuration: {0}")]
    InvalidConfig(String),
}
