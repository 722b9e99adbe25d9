//! Bounded-concurrency batch runner.
//!
//! ```text
//!   specs[0] ─┐                  ┌─ submit ─ wait ─┐
//!   specs[1] ─┼─ gate (N slots) ─┼─ submit ─ wait ─┼─→ slots[index] ─→ ResultSet
//!   specs[k] ─┘                  └─ submit ─ wait ─┘
//! ```
//!
//! Every spec becomes a task future tagged with its input index. All task
//! futures are polled from inside the `run_all` future itself, so the whole
//! batch is one cooperative unit: dropping it drops every task and returns
//! every held permit to the gate. Remote jobs that were already accepted
//! are abandoned, not cancelled.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use sfapi_hal::{HalError, HalResult, JobHandle, JobSpec, JobSubmitter, PollPolicy};
use tracing::{debug, info, instrument, warn};

use crate::error::SchedResult;
use crate::gate::ConcurrencyGate;
use crate::result::ResultSet;

/// Callback invoked as each job finishes, with its input index.
pub type CompletionHook = Box<dyn Fn(usize, &HalResult<JobHandle>) + Send + Sync>;

/// Runs a list of job specs against one submitter under a concurrency cap.
pub struct BatchRunner {
    submitter: Arc<dyn JobSubmitter>,
    policy: PollPolicy,
    on_complete: Option<CompletionHook>,
}

impl BatchRunner {
    /// Create a runner with the default poll policy.
    pub fn new(submitter: Arc<dyn JobSubmitter>) -> Self {
        Self {
            submitter,
            policy: PollPolicy::default(),
            on_complete: None,
        }
    }

    /// Set the poll policy used while waiting for each job.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register a callback fired once per job, in completion order.
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize, &HalResult<JobHandle>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// The poll policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Submit every spec and wait for each job, never running more than
    /// `limit` jobs at once.
    ///
    /// The returned [`ResultSet`] has one slot per spec, in input order.
    /// A failing job only fills its own slot with the error.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `limit` is zero or the poll policy is invalid.
    /// Nothing is submitted in that case.
    #[instrument(skip(self, specs), fields(submitter = self.submitter.name(), jobs = specs.len()))]
    pub async fn run_all(&self, specs: &[JobSpec], limit: usize) -> SchedResult<ResultSet> {
        let gate = ConcurrencyGate::new(limit)?;
        self.run_with_gate(specs, &gate).await
    }

    /// Like [`run_all`](Self::run_all), with a caller-owned gate.
    ///
    /// Sharing one gate between several runs bounds their combined
    /// concurrency.
    pub async fn run_with_gate(
        &self,
        specs: &[JobSpec],
        gate: &ConcurrencyGate,
    ) -> SchedResult<ResultSet> {
        self.policy.validate()?;

        if specs.is_empty() {
            return Ok(ResultSet::default());
        }

        info!(
            "Running {} jobs on {} (limit {})",
            specs.len(),
            self.submitter.name(),
            gate.limit()
        );

        let mut slots: Vec<Option<HalResult<JobHandle>>> =
            std::iter::repeat_with(|| None).take(specs.len()).collect();

        let mut tasks: FuturesUnordered<_> = specs
            .iter()
            .enumerate()
            .map(move |(index, spec)| async move { (index, self.run_one(index, spec, gate).await) })
            .collect();

        while let Some((index, outcome)) = tasks.next().await {
            if let Some(hook) = &self.on_complete {
                hook(index, &outcome);
            }
            slots[index] = Some(outcome);
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(HalError::Backend(format!("task {index} produced no result")))
                })
            })
            .collect();

        Ok(ResultSet::from_slots(slots))
    }

    /// Admit, submit and wait for one job. The permit is held until the
    /// wait returns, whatever the outcome.
    async fn run_one(
        &self,
        index: usize,
        spec: &JobSpec,
        gate: &ConcurrencyGate,
    ) -> HalResult<JobHandle> {
        let _permit = gate
            .acquire()
            .await
            .map_err(|e| HalError::Backend(e.to_string()))?;
        debug!(index, in_use = gate.in_use(), "job admitted");

        let mut handle = self.submitter.submit(spec).await.inspect_err(|e| {
            warn!(index, "submission failed: {e}");
        })?;
        info!(index, job_id = %handle.id, "job submitted");

        self.submitter
            .wait_until_terminal(&mut handle, &self.policy)
            .await
            .inspect_err(|e| warn!(index, job_id = %handle.id, "wait failed: {e}"))?;
        info!(index, job_id = %handle.id, status = %handle.status, "job finished");

        Ok(handle)
    }
}

impl fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRunner")
            .field("submitter", &self.submitter.name())
            .field("policy", &self.policy)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sfapi_hal::{JobId, JobStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts every job and reports it completed on the first poll.
    #[derive(Default)]
    struct InstantSubmitter {
        submits: AtomicUsize,
    }

    #[async_trait]
    impl JobSubmitter for InstantSubmitter {
        fn name(&self) -> &str {
            "instant"
        }

        async fn submit(&self, spec: &JobSpec) -> HalResult<JobHandle> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(JobHandle::new(format!("job-{n}"), JobStatus::Queued).with_name(spec.name()))
        }

        async fn status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
            Ok(JobStatus::Completed)
        }

        async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
            Ok(())
        }
    }

    fn runner(submitter: Arc<InstantSubmitter>) -> BatchRunner {
        BatchRunner::new(submitter).with_policy(PollPolicy::new(Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let submitter = Arc::new(InstantSubmitter::default());
        let results = runner(submitter.clone()).run_all(&[], 4).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(submitter.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_is_config_error() {
        let submitter = Arc::new(InstantSubmitter::default());
        let specs = vec![JobSpec::new("echo 1")];
        let err = runner(submitter.clone()).run_all(&specs, 0).await.unwrap_err();
        assert!(matches!(err, crate::SchedError::ConfigError(_)));
        assert_eq!(submitter.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_policy_is_config_error() {
        let submitter = Arc::new(InstantSubmitter::default());
        let specs = vec![JobSpec::new("echo 1")];
        let err = BatchRunner::new(submitter.clone())
            .with_policy(PollPolicy::new(Duration::ZERO))
            .run_all(&specs, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::SchedError::ConfigError(_)));
        assert_eq!(submitter.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completion_hook_sees_every_job() {
        let submitter = Arc::new(InstantSubmitter::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let specs: Vec<_> = (0..5)
            .map(|i| JobSpec::from_template("echo {}", i).with_name(format!("hello-{i}")))
            .collect();
        let results = runner(submitter)
            .on_complete(move |_, outcome| {
                assert!(outcome.is_ok());
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .run_all(&specs, 2)
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(results.all_completed());
        let names: Vec<_> = results
            .handles()
            .map(|(_, h)| h.name.clone().unwrap())
            .collect();
        assert_eq!(names, ["hello-0", "hello-1", "hello-2", "hello-3", "hello-4"]);
    }
}
