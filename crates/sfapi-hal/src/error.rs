//! Error types for the HAL crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Invalid caller input (rejected before any remote call).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Authentication failed or credentials are missing.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The remote service rejected the job.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// Transport-level failure reported by an adapter.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Deadline elapsed before the job reached a terminal status.
    #[error("Timeout waiting for job {job_id} after {}s", waited.as_secs())]
    Timeout {
        /// Job that was being waited on.
        job_id: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl HalError {
    /// Whether a status poll that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            HalError::Transport(_) => true,
            HalError::Network(e) => !e.is_builder(),
            _ => false,
        }
    }

    /// Whether this error was raised before any remote call was made.
    pub fn is_configuration(&self) -> bool {
        matches!(self, HalError::Configuration(_))
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
