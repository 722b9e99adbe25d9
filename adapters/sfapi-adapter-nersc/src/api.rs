//! NERSC Superfacility API REST client.
//!
//! Implements the subset of the v1.2 API needed to run batch jobs.
//!
//! ## Submission flow
//!
//! 1. `POST /compute/jobs/{machine}` with form `job=<script>&isPath=false`
//!    → `task_id`
//! 2. Poll `GET /tasks/{task_id}` until `result` is set; it is a JSON string
//!    carrying the SLURM `jobid`
//! 3. Poll `GET /compute/jobs/{machine}/{jobid}?sacct=true` until the SLURM
//!    state is terminal

// Allow dead code for API response fields that are deserialized but not yet used.
#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sfapi_hal::TokenProvider;
use tracing::{debug, instrument};

use crate::backend::Compute;
use crate::error::{NerscError, NerscResult};
use crate::machine::Machine;

/// Superfacility API base URL.
pub const BASE_URL: &str = "https://api.nersc.gov/api/v1.2";

/// User agent sent with every request.
const USER_AGENT: &str = concat!("sfapi-adapter-nersc/", env!("CARGO_PKG_VERSION"));

/// Superfacility API client.
///
/// A client without a token provider can only reach public endpoints
/// such as [`get_status`](Self::get_status).
#[derive(Clone)]
pub struct SfApiClient {
    /// HTTP client.
    client: Client,
    /// API base URL (default: https://api.nersc.gov/api/v1.2).
    base_url: String,
    /// Bearer token source.
    auth: Option<Arc<dyn TokenProvider>>,
}

impl fmt::Debug for SfApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfApiClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SfApiClient {
    /// Create a client without credentials.
    pub fn new() -> NerscResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(NerscError::Http)?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            auth: None,
        })
    }

    /// Attach a token provider for authenticated endpoints.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Override the base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a token provider is configured.
    pub fn has_credentials(&self) -> bool {
        self.auth.is_some()
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Job submission handle for `machine`.
    ///
    /// # Errors
    ///
    /// `AuthRequired` when the client has no credentials.
    pub fn compute(&self, machine: Machine) -> NerscResult<Compute> {
        if !self.has_credentials() {
            return Err(NerscError::AuthRequired(format!("compute on {machine}")));
        }
        Ok(Compute::new(self.clone(), machine))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self, operation: &str) -> NerscResult<String> {
        let provider = self
            .auth
            .as_ref()
            .ok_or_else(|| NerscError::AuthRequired(operation.to_string()))?;
        provider
            .get_token()
            .await
            .map_err(|e| NerscError::AuthFailed(e.to_string()))
    }

    // ─── Public endpoints ───────────────────────────────────────────

    /// Get the operational status of a machine. Needs no credentials.
    #[instrument(skip(self))]
    pub async fn get_status(&self, machine: Machine) -> NerscResult<SystemStatus> {
        let url = self.url(&format!("/status/{machine}"));
        debug!("Getting system status from {}", url);

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    // ─── Jobs ───────────────────────────────────────────────────────

    /// Submit a batch script. Returns the task tracking the submission.
    #[instrument(skip(self, script))]
    pub async fn submit_job(&self, machine: Machine, script: &str) -> NerscResult<SubmitResponse> {
        let token = self.bearer("job submission").await?;
        let url = self.url(&format!("/compute/jobs/{machine}"));
        debug!("Submitting job to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(&[("job", script), ("isPath", "false")])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the accounting record of a job.
    #[instrument(skip(self))]
    pub async fn get_job(&self, machine: Machine, job_id: &str) -> NerscResult<JobQueryResponse> {
        let token = self.bearer("job query").await?;
        let url = self.url(&format!("/compute/jobs/{machine}/{job_id}"));
        debug!("Getting job from {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("sacct", "true")])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Cancel a job.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, machine: Machine, job_id: &str) -> NerscResult<JobQueryResponse> {
        let token = self.bearer("job cancellation").await?;
        let url = self.url(&format!("/compute/jobs/{machine}/{job_id}"));
        debug!("Cancelling job at {}", url);

        let response = self.client.delete(&url).bearer_auth(token).send().await?;
        self.handle_response(response).await
    }

    // ─── Tasks ──────────────────────────────────────────────────────

    /// Get an asynchronous task.
    #[instrument(skip(self))]
    pub async fn get_task(&self, task_id: &str) -> NerscResult<TaskResponse> {
        let token = self.bearer("task query").await?;
        let url = self.url(&format!("/tasks/{task_id}"));
        debug!("Getting task from {}", url);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        self.handle_response(response).await
    }

    /// Handle HTTP response, extracting JSON or returning an error.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> NerscResult<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.json().await?;
            Ok(body)
        } else {
            let message = response.text().await.unwrap_or_default();

            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(NerscError::AuthFailed(message))
                }
                StatusCode::NOT_FOUND => Err(NerscError::JobNotFound(message)),
                _ => Err(NerscError::ApiError {
                    status: status.as_u16(),
                    message,
                }),
            }
        }
    }
}

fn is_ok(status: &str) -> bool {
    status.eq_ignore_ascii_case("ok")
}

// ─── Response types ─────────────────────────────────────────────────

/// Machine status from `GET /status/{machine}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Short name (e.g. "perlmutter").
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// "compute", "filesystem", ...
    #[serde(default)]
    pub system_type: Option<String>,
    /// Operator notes.
    #[serde(default)]
    pub notes: Vec<String>,
    /// "active", "degraded", "unavailable" or "other".
    pub status: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SystemStatus {
    /// Check if the machine is accepting work.
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Response to `POST /compute/jobs/{machine}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Task tracking the submission.
    #[serde(default)]
    pub task_id: Option<String>,
    /// "OK" or "ERROR".
    pub status: String,
    /// Error text when `status` is not OK.
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitResponse {
    /// The task id, or the rejection reason.
    pub fn into_task_id(self) -> NerscResult<String> {
        match self.task_id {
            Some(id) if is_ok(&self.status) => Ok(id),
            _ => Err(NerscError::SubmitRejected(
                self.error
                    .unwrap_or_else(|| format!("submission returned status {}", self.status)),
            )),
        }
    }
}

/// Response to `GET /tasks/{task_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResponse {
    /// Task id.
    pub id: String,
    /// "new", "active", "completed" or "failed".
    #[serde(default)]
    pub status: Option<String>,
    /// JSON-encoded [`TaskResult`], present once the task has finished.
    #[serde(default)]
    pub result: Option<String>,
}

impl TaskResponse {
    /// Whether the task has stopped running.
    pub fn is_done(&self) -> bool {
        self.result.is_some()
            || matches!(
                self.status.as_deref().map(str::to_ascii_lowercase).as_deref(),
                Some("completed" | "failed" | "error")
            )
    }

    /// Decode the embedded result, if the task has one.
    pub fn decode_result(&self) -> NerscResult<Option<TaskResult>> {
        self.result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(NerscError::from)
    }
}

/// Payload of a finished submission task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResult {
    /// "ok" or "error".
    pub status: String,
    /// SLURM job id.
    #[serde(default)]
    pub jobid: Option<String>,
    /// Error text from the API or `sbatch`.
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskResult {
    /// The job id, or the failure reason.
    pub fn into_job_id(self, task_id: &str) -> NerscResult<String> {
        match self.jobid {
            Some(jobid) if is_ok(&self.status) => Ok(jobid),
            _ => Err(NerscError::TaskFailed {
                task_id: task_id.to_string(),
                message: self
                    .error
                    .unwrap_or_else(|| format!("task finished with status {}", self.status)),
            }),
        }
    }
}

/// Response to the job query and cancel endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct JobQueryResponse {
    /// "OK" or "ERROR".
    pub status: String,
    /// Accounting records; empty until the job shows up in `sacct`.
    #[serde(default)]
    pub output: Vec<JobRecord>,
    /// Error text when `status` is not OK.
    #[serde(default)]
    pub error: Option<String>,
}

impl JobQueryResponse {
    /// Turn an `ERROR` body into an error.
    ///
    /// These arrive with HTTP 200 when `sacct`/`scancel` fails on the login
    /// node, so they are reported as [`NerscError::Scheduler`] and retried by
    /// pollers.
    pub fn check(self) -> NerscResult<Self> {
        if is_ok(&self.status) {
            Ok(self)
        } else {
            Err(NerscError::Scheduler(self.error.unwrap_or(self.status)))
        }
    }
}

/// One `sacct`/`squeue` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// SLURM job id.
    #[serde(default)]
    pub jobid: Option<String>,
    /// Job name.
    #[serde(default)]
    pub name: Option<String>,
    /// SLURM state, long form.
    #[serde(default)]
    pub state: Option<String>,
    /// squeue short state code.
    #[serde(default)]
    pub st: Option<String>,
    /// Remaining columns, kept verbatim.
    #[serde(flatten)]
    pub extra: FxHashMap<String, serde_json::Value>,
}

impl JobRecord {
    /// The most specific state the record carries.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref().or(self.st.as_deref())
    }
}
