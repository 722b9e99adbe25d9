//! NERSC compute submitter.
//!
//! Implements [`JobSubmitter`] for one machine. Submission is two-phase:
//! the API answers with a task id, and the SLURM job id only appears once
//! that task has finished, so `submit()` polls the task before returning.

use std::time::Duration;

use async_trait::async_trait;
use sfapi_hal::{HalResult, JobHandle, JobId, JobSpec, JobStatus, JobSubmitter, StatusReport};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::api::SfApiClient;
use crate::error::{NerscError, NerscResult};
use crate::machine::Machine;
use crate::state::parse_slurm_state;

/// How long to wait between submission task polls.
pub const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum time for a submission task to yield a job id.
pub const TASK_MAX_WAIT: Duration = Duration::from_secs(300);

/// Consecutive transient task poll failures after which submission fails.
pub const TASK_MAX_POLL_FAILURES: u32 = 3;

/// Batch job submitter bound to one NERSC machine.
///
/// Obtained from [`SfApiClient::compute`], which requires credentials.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use sfapi_adapter_nersc::{Machine, SfApiClient};
/// use sfapi_hal::{EnvTokenProvider, JobSpec, JobSubmitter, PollPolicy};
///
/// let client = SfApiClient::new()?
///     .with_token_provider(Arc::new(EnvTokenProvider::sfapi()));
/// let perlmutter = client.compute(Machine::Perlmutter)?;
///
/// let mut job = perlmutter.submit(&JobSpec::new(SCRIPT)).await?;
/// perlmutter.wait_until_terminal(&mut job, &PollPolicy::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Compute {
    client: SfApiClient,
    machine: Machine,
    task_poll_interval: Duration,
    task_max_wait: Duration,
}

impl Compute {
    pub(crate) fn new(client: SfApiClient, machine: Machine) -> Self {
        Self {
            client,
            machine,
            task_poll_interval: TASK_POLL_INTERVAL,
            task_max_wait: TASK_MAX_WAIT,
        }
    }

    /// Override how submission tasks are polled.
    pub fn with_task_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.task_poll_interval = interval;
        self.task_max_wait = max_wait;
        self
    }

    /// The machine jobs go to.
    pub fn machine(&self) -> Machine {
        self.machine
    }

    /// Submit `script` and wait for the SLURM job id.
    #[instrument(skip(self, script), fields(machine = %self.machine))]
    pub async fn submit_script(&self, script: &str) -> NerscResult<String> {
        let task_id = self
            .client
            .submit_job(self.machine, script)
            .await?
            .into_task_id()?;
        debug!(task_id = %task_id, "submission accepted");

        self.await_task(&task_id).await
    }

    async fn await_task(&self, task_id: &str) -> NerscResult<String> {
        let start = Instant::now();
        let mut failures = 0u32;

        loop {
            match self.client.get_task(task_id).await {
                Ok(task) => {
                    failures = 0;
                    if let Some(result) = task.decode_result()? {
                        return result.into_job_id(task_id);
                    }
                    if task.is_done() {
                        return Err(NerscError::TaskFailed {
                            task_id: task_id.to_string(),
                            message: format!(
                                "task ended with status {} and no result",
                                task.status.as_deref().unwrap_or("unknown")
                            ),
                        });
                    }
                    debug!(task_id, "task still running, waiting {:?}", self.task_poll_interval);
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures >= TASK_MAX_POLL_FAILURES {
                        return Err(e);
                    }
                    warn!(task_id, failures, "task poll failed, retrying: {e}");
                }
                Err(e) => return Err(e),
            }

            if start.elapsed() >= self.task_max_wait {
                return Err(NerscError::Timeout(task_id.to_string()));
            }

            sleep(self.task_poll_interval).await;
        }
    }

    /// Current SLURM state of a job.
    ///
    /// A job that does not show up in accounting yet is reported as queued.
    pub async fn job_state(&self, job_id: &str) -> NerscResult<JobStatus> {
        Ok(self.job_report(job_id).await?.status)
    }

    /// Current SLURM state of a job together with its `sacct` row.
    #[instrument(skip(self), fields(machine = %self.machine))]
    pub async fn job_report(&self, job_id: &str) -> NerscResult<StatusReport> {
        let response = self.client.get_job(self.machine, job_id).await?.check()?;

        let Some(record) = response.output.into_iter().next() else {
            debug!(job_id, "job not in accounting yet");
            return Ok(JobStatus::Queued.into());
        };

        let status = record.state().map_or(JobStatus::Queued, parse_slurm_state);
        debug!(job_id, %status, "job state");
        Ok(StatusReport::from(status).with_record(serde_json::to_value(&record)?))
    }
}

#[async_trait]
impl JobSubmitter for Compute {
    fn name(&self) -> &str {
        self.machine.as_str()
    }

    async fn submit(&self, spec: &JobSpec) -> HalResult<JobHandle> {
        let job_id = self.submit_script(spec.script()).await?;
        info!(machine = %self.machine, job_id = %job_id, "job submitted");

        Ok(JobHandle::new(job_id, JobStatus::Queued)
            .with_submitter(self.name())
            .with_name(spec.name()))
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        Ok(self.job_state(job_id.as_str()).await?)
    }

    async fn status_report(&self, job_id: &JobId) -> HalResult<StatusReport> {
        Ok(self.job_report(job_id.as_str()).await?)
    }

    async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
        self.client
            .cancel_job(self.machine, job_id.as_str())
            .await?
            .check()?;
        info!(machine = %self.machine, %job_id, "job cancelled");
        Ok(())
    }
}
