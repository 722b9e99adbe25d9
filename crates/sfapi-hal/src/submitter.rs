//! Submitter trait and polling policy.
//!
//! The [`JobSubmitter`] trait is the seam between the orchestration core and
//! a remote batch API:
//!
//! ```text
//!   submit() ──→ status() ──→ status() ──→ ... ──→ terminal
//!   (async)       (async)                          (handle returned)
//! ```
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `submit()` | async | yes | `HalResult<JobHandle>` |
//! | `status()` | async | yes | `HalResult<JobStatus>` |
//! | `cancel()` | async | yes | `HalResult<()>` |
//! | `status_report()` | async | provided | `HalResult<StatusReport>` |
//! | `wait_until_terminal()` | async | provided | `HalResult<()>` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use crate::error::{HalError, HalResult};
use crate::job::{JobHandle, JobId, JobSpec, JobStatus, StatusReport};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default deadline for a single job to reach a terminal status.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(86_400);

/// Default number of consecutive failed polls tolerated.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;

/// Stand-in deadline when `max_wait` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How a waiter polls for a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Time between status polls.
    pub poll_interval: Duration,
    /// Deadline measured from the start of the wait.
    pub max_wait: Duration,
    /// Consecutive transient poll failures after which the wait gives up.
    pub max_poll_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl PollPolicy {
    /// Create a policy with the given poll interval and default limits.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Default::default()
        }
    }

    /// Set the deadline.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the consecutive poll failure bound.
    pub fn with_max_poll_failures(mut self, max_poll_failures: u32) -> Self {
        self.max_poll_failures = max_poll_failures;
        self
    }

    /// Reject policies that would spin or never poll.
    pub fn validate(&self) -> HalResult<()> {
        if self.poll_interval.is_zero() {
            return Err(HalError::Configuration(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.max_poll_failures == 0 {
            return Err(HalError::Configuration(
                "max_poll_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Trait for remote batch job submitters.
///
/// # Contract
///
/// - `submit()` either returns a handle for an accepted job or fails with
///   `SubmissionFailed`/`AuthenticationFailed` (rejected) or a transient
///   transport error.
/// - `status()` is a single remote query with no retries of its own.
/// - `wait_until_terminal()` has a default implementation driven by
///   [`PollPolicy`].
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Get the name of this submitter.
    fn name(&self) -> &str;

    /// Create a remote job for `spec`.
    async fn submit(&self, spec: &JobSpec) -> HalResult<JobHandle>;

    /// Query the current status of a job.
    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus>;

    /// Ask the remote service to cancel a job.
    async fn cancel(&self, job_id: &JobId) -> HalResult<()>;

    /// Query the current status along with the raw scheduler record.
    ///
    /// Backends that keep a per-job record override this; the default
    /// carries no record.
    async fn status_report(&self, job_id: &JobId) -> HalResult<StatusReport> {
        self.status(job_id).await.map(StatusReport::from)
    }

    /// Poll until the job reaches a terminal status.
    ///
    /// Updates `handle` after every successful poll and returns as soon as a
    /// terminal status is seen, without polling again. A job that ends
    /// `Failed` or `Cancelled` is returned normally; the caller inspects
    /// `handle.status`.
    ///
    /// # Errors
    ///
    /// - `Timeout` once `policy.max_wait` has elapsed, including while a
    ///   status query is still in flight.
    /// - `Transport` after `policy.max_poll_failures` consecutive transient
    ///   poll failures.
    /// - Any non-transient error from `status()`, unchanged.
    async fn wait_until_terminal(
        &self,
        handle: &mut JobHandle,
        policy: &PollPolicy,
    ) -> HalResult<()> {
        policy.validate()?;

        let start = Instant::now();
        let deadline = start
            .checked_add(policy.max_wait)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut failures = 0u32;

        loop {
            if handle.status.is_terminal() {
                return Ok(());
            }

            let Ok(polled) = timeout_at(deadline, self.status_report(&handle.id)).await else {
                return Err(HalError::Timeout {
                    job_id: handle.id.0.clone(),
                    waited: start.elapsed(),
                });
            };

            match polled {
                Ok(report) => {
                    failures = 0;
                    handle.observe_report(report);
                    if handle.status.is_terminal() {
                        debug!(job_id = %handle.id, status = %handle.status, "job reached terminal status");
                        return Ok(());
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures >= policy.max_poll_failures {
                        return Err(HalError::Transport(format!(
                            "status poll for job {} failed {failures} times in a row: {e}",
                            handle.id
                        )));
                    }
                    warn!(job_id = %handle.id, failures, "status poll failed, retrying: {e}");
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= policy.max_wait {
                return Err(HalError::Timeout {
                    job_id: handle.id.0.clone(),
                    waited: elapsed,
                });
            }

            debug!(job_id = %handle.id, status = %handle.status, "waiting {:?}", policy.poll_interval);
            sleep(policy.poll_interval.min(policy.max_wait - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed sequence of poll outcomes, then repeats the last one.
    struct ScriptedSubmitter {
        script: Mutex<VecDeque<HalResult<JobStatus>>>,
        last: JobStatus,
        polls: AtomicU32,
        delay: Duration,
    }

    impl ScriptedSubmitter {
        fn new(script: Vec<HalResult<JobStatus>>, last: JobStatus) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last,
                polls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl JobSubmitter for ScriptedSubmitter {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn submit(&self, _spec: &JobSpec) -> HalResult<JobHandle> {
            Ok(JobHandle::new("1", JobStatus::Queued))
        }

        async fn status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.last.clone()))
        }

        async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
            Ok(())
        }
    }

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_secs(1)).with_max_wait(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stops_at_first_terminal_status() {
        let submitter = ScriptedSubmitter::new(
            vec![
                Ok(JobStatus::Queued),
                Ok(JobStatus::Running),
                Ok(JobStatus::Completed),
            ],
            JobStatus::Running,
        );
        let mut handle = JobHandle::new("1", JobStatus::Queued);

        submitter.wait_until_terminal(&mut handle, &policy()).await.unwrap();

        assert_eq!(handle.status, JobStatus::Completed);
        assert_eq!(handle.polls, 3);
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_is_not_an_error() {
        let submitter = ScriptedSubmitter::new(vec![], JobStatus::Failed("NODE_FAIL".into()));
        let mut handle = JobHandle::new("1", JobStatus::Queued);

        submitter.wait_until_terminal(&mut handle, &policy()).await.unwrap();
        assert_eq!(handle.status, JobStatus::Failed("NODE_FAIL".into()));
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_terminal_handle_does_not_poll() {
        let submitter = ScriptedSubmitter::new(vec![], JobStatus::Running);
        let mut handle = JobHandle::new("1", JobStatus::Cancelled);

        submitter.wait_until_terminal(&mut handle, &policy()).await.unwrap();
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let submitter = ScriptedSubmitter::new(
            vec![
                Err(HalError::Transport("reset".into())),
                Err(HalError::Transport("reset".into())),
                Ok(JobStatus::Running),
                Err(HalError::Transport("reset".into())),
                Ok(JobStatus::Completed),
            ],
            JobStatus::Running,
        );
        let mut handle = JobHandle::new("1", JobStatus::Queued);

        submitter.wait_until_terminal(&mut handle, &policy()).await.unwrap();
        assert_eq!(handle.status, JobStatus::Completed);
        assert_eq!(handle.polls, 2);
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_surface_transport_error() {
        let submitter = ScriptedSubmitter::new(
            vec![
                Err(HalError::Transport("down".into())),
                Err(HalError::Transport("down".into())),
                Err(HalError::Transport("down".into())),
            ],
            JobStatus::Completed,
        );
        let mut handle = JobHandle::new("1", JobStatus::Queued);

        let err = submitter
            .wait_until_terminal(&mut handle, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::Transport(msg) if msg.contains("3 times")));
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_returned_immediately() {
        let submitter = ScriptedSubmitter::new(
            vec![Err(HalError::JobNotFound("1".into()))],
            JobStatus::Completed,
        );
        let mut handle = JobHandle::new("1", JobStatus::Queued);

        let err = submitter
            .wait_until_terminal(&mut handle, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::JobNotFound(_)));
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_produces_timeout() {
        let submitter = ScriptedSubmitter::new(vec![], JobStatus::Running);
        let mut handle = JobHandle::new("1", JobStatus::Queued);
        let policy = PollPolicy::new(Duration::from_secs(4)).with_max_wait(Duration::from_secs(10));

        let start = Instant::now();
        let err = submitter
            .wait_until_terminal(&mut handle, &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, HalError::Timeout { ref job_id, .. } if job_id == "1"));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));
        // Polls at t = 0, 4, 8, 10.
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 4);
        assert_eq!(handle.status, JobStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_status_query() {
        let submitter = ScriptedSubmitter::new(vec![], JobStatus::Running)
            .with_delay(Duration::from_secs(100));
        let mut handle = JobHandle::new("1", JobStatus::Queued);
        let policy = PollPolicy::new(Duration::from_secs(1)).with_max_wait(Duration::from_secs(10));

        let start = Instant::now();
        let err = submitter
            .wait_until_terminal(&mut handle, &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, HalError::Timeout { ref job_id, .. } if job_id == "1"));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));
        assert_eq!(submitter.polls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_report_has_no_record() {
        let submitter = ScriptedSubmitter::new(vec![], JobStatus::Completed);
        let report = submitter.status_report(&JobId::new("1")).await.unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert!(report.record.is_none());
    }

    #[test]
    fn test_policy_validation() {
        assert!(PollPolicy::default().validate().is_ok());
        assert!(PollPolicy::new(Duration::ZERO).validate().is_err());
        assert!(
            PollPolicy::default()
                .with_max_poll_failures(0)
                .validate()
                .is_err()
        );
    }
}
