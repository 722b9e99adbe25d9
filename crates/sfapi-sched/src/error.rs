//! Error handling for the batch scheduler.

use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that abort a whole batch run.
///
/// Per-job failures never show up here; they are stored in the job's slot
/// of the [`ResultSet`](crate::ResultSet).
#[derive(Error, Debug)]
pub enum SchedError {
    /// Invalid caller input, rejected before any remote call.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The concurrency gate was closed while tasks were waiting on it.
    #[error("Concurrency gate closed")]
    GateClosed,
}

impl From<sfapi_hal::HalError> for SchedError {
    fn from(e: sfapi_hal::HalError) -> Self {
        SchedError::ConfigError(e.to_string())
    }
}
