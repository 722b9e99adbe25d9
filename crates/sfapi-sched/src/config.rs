//! Batch run configuration.
//!
//! Values come from defaults, then a config file section, then `SFAPI_*`
//! environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SFAPI_CONCURRENCY` | `concurrency` |
//! | `SFAPI_POLL_INTERVAL` | `poll_interval_secs` |
//! | `SFAPI_MAX_WAIT` | `max_wait_time_secs` |
//! | `SFAPI_MAX_POLL_FAILURES` | `max_poll_failures` |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sfapi_hal::PollPolicy;

use crate::error::{SchedError, SchedResult};

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of simultaneously active jobs.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Status polling interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum time to wait for a single job (seconds).
    #[serde(default = "default_max_wait")]
    pub max_wait_time_secs: u64,

    /// Consecutive failed polls tolerated before a job is given up.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_wait() -> u64 {
    86_400 // 24 hours
}

fn default_max_poll_failures() -> u32 {
    3
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval(),
            max_wait_time_secs: default_max_wait(),
            max_poll_failures: default_max_poll_failures(),
        }
    }
}

impl BatchConfig {
    /// Apply overrides from the process environment.
    pub fn merge_env(self) -> Self {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Variables that are absent or fail to parse leave the field unchanged.
    pub fn merge_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("SFAPI_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = val;
        }
        if let Some(val) = lookup("SFAPI_POLL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.poll_interval_secs = val;
        }
        if let Some(val) = lookup("SFAPI_MAX_WAIT").and_then(|v| v.parse().ok()) {
            self.max_wait_time_secs = val;
        }
        if let Some(val) = lookup("SFAPI_MAX_POLL_FAILURES").and_then(|v| v.parse().ok()) {
            self.max_poll_failures = val;
        }
        self
    }

    /// Check the configuration before any job is submitted.
    pub fn validate(&self) -> SchedResult<()> {
        if self.concurrency == 0 {
            return Err(SchedError::ConfigError(
                "concurrency must be at least 1".into(),
            ));
        }
        self.poll_policy().validate()?;
        Ok(())
    }

    /// Poll policy derived from this configuration.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(self.poll_interval_secs))
            .with_max_wait(Duration::from_secs(self.max_wait_time_secs))
            .with_max_poll_failures(self.max_poll_failures)
    }
}
