//! Error types for the NERSC adapter.

use thiserror::Error;

/// Result type for NERSC operations.
pub type NerscResult<T> = Result<T, NerscError>;

/// Errors that can occur when talking to the Superfacility API.
#[derive(Debug, Error)]
pub enum NerscError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An authenticated endpoint was used on a client without credentials.
    #[error("Credentials required for {0} (set SFAPI_TOKEN or configure a client id and secret)")]
    AuthRequired(String),

    /// The token was rejected.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// SLURM or the API refused the submission.
    #[error("Submission rejected: {0}")]
    SubmitRejected(String),

    /// The asynchronous task behind a request failed.
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The API answered `ERROR` because the scheduler command behind it failed.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// API error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Timeout waiting for a submission task to produce a job id.
    #[error("Timeout waiting for task {0}")]
    Timeout(String),

    /// Unrecognised machine name.
    #[error("Unknown machine: {0}")]
    UnknownMachine(String),
}

impl NerscError {
    /// Whether the failure is on the server or network side.
    pub fn is_transient(&self) -> bool {
        match self {
            NerscError::Http(e) => !e.is_builder() && !e.is_decode(),
            NerscError::ApiError { status, .. } => *status == 429 || *status >= 500,
            NerscError::Scheduler(_) => true,
            _ => false,
        }
    }
}

impl From<NerscError> for sfapi_hal::HalError {
    fn from(e: NerscError) -> Self {
        use sfapi_hal::HalError;

        if e.is_transient() {
            return match e {
                NerscError::Http(inner) => HalError::Network(inner),
                other => HalError::Transport(other.to_string()),
            };
        }

        match e {
            NerscError::AuthRequired(_) | NerscError::AuthFailed(_) => {
                HalError::AuthenticationFailed(e.to_string())
            }
            NerscError::SubmitRejected(msg) => HalError::SubmissionFailed(msg),
            NerscError::TaskFailed { .. } => HalError::SubmissionFailed(e.to_string()),
            NerscError::JobNotFound(id) => HalError::JobNotFound(id),
            NerscError::Json(inner) => HalError::Serialization(inner),
            NerscError::Http(inner) => HalError::Network(inner),
            NerscError::Timeout(_) | NerscError::Scheduler(_) => {
                HalError::Transport(e.to_string())
            }
            NerscError::UnknownMachine(_) => HalError::Configuration(e.to_string()),
            NerscError::ApiError { .. } => HalError::Backend(e.to_string()),
        }
    }
}
