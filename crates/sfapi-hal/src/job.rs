//! Job lifecycle types.
//!
//! The job state machine is owned by the remote scheduler; the client only
//! observes it:
//!
//! ```text
//!   submit() ──→ Queued ──→ Running ──→ Completed
//!                  │           │
//!                  │           ├──→ Failed(reason)
//!                  │           │
//!                  └───────────┴──→ Cancelled
//! ```
//!
//! `Unknown` covers any state string the adapter could not classify. It is
//! not terminal, so a waiter keeps polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a job, assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job as last reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job is waiting in queue.
    Queued,
    /// Job is currently running.
    Running,
    /// Job completed successfully.
    Completed,
    /// Job failed; carries the scheduler's reason or state name.
    Failed(String),
    /// Job was cancelled.
    Cancelled,
    /// State the adapter could not classify (raw value kept).
    Unknown(String),
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// Short name without the payload.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed(_) => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed(msg) => write!(f, "Failed: {msg}"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
            JobStatus::Unknown(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}

/// Work to submit: a batch script body plus an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl JobSpec {
    /// Create a spec from a script body.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            name: None,
        }
    }

    /// Render a script template, replacing every `{}` with `value`.
    pub fn from_template(template: &str, value: impl std::fmt::Display) -> Self {
        Self::new(template.replace("{}", &value.to_string()))
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The script body.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Result of one status query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Classified status.
    pub status: JobStatus,
    /// Raw scheduler record the status was read from, when the backend has one.
    pub record: Option<serde_json::Value>,
}

impl StatusReport {
    /// Attach the raw record.
    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.record = Some(record);
        self
    }
}

impl From<JobStatus> for StatusReport {
    fn from(status: JobStatus) -> Self {
        Self {
            status,
            record: None,
        }
    }
}

/// Client-side reference to an accepted remote job.
///
/// `status` is only changed through [`JobHandle::observe`], which the
/// polling loop calls after every successful status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    /// The job identifier.
    pub id: JobId,
    /// Last observed status.
    pub status: JobStatus,
    /// Number of successful status polls.
    pub polls: u32,
    /// Name of the submitter that accepted the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,
    /// Display name copied from the `JobSpec`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Time the job was accepted.
    pub submitted_at: DateTime<Utc>,
    /// Time a terminal status was first observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Last scheduler record seen for the job (e.g. its `sacct` row).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

impl JobHandle {
    /// Create a handle for a freshly accepted job.
    pub fn new(id: impl Into<JobId>, initial_status: JobStatus) -> Self {
        let mut handle = Self {
            id: id.into(),
            status: JobStatus::Queued,
            polls: 0,
            submitter: None,
            name: None,
            submitted_at: Utc::now(),
            finished_at: None,
            record: None,
        };
        handle.set_status(initial_status);
        handle
    }

    /// Set the submitter name.
    pub fn with_submitter(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_string);
        self
    }

    /// Record the result of one successful status poll.
    pub fn observe(&mut self, status: JobStatus) {
        self.polls += 1;
        self.set_status(status);
    }

    /// Record a successful poll that may carry the scheduler's raw record.
    ///
    /// A report without a record keeps the previous one.
    pub fn observe_report(&mut self, report: StatusReport) {
        self.observe(report.status);
        if report.record.is_some() {
            self.record = report.record;
        }
    }

    fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        if self.status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }
}
