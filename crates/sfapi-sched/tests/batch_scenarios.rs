//! Batch runner scenarios against a simulated cluster.
//!
//! The simulated cluster interprets each script as a tiny instruction:
//!
//! - `run <secs>`: completes `<secs>` seconds after submission
//! - `fail <secs>`: ends `Failed` after `<secs>` seconds
//! - `reject`: submission is refused
//! - `hang`: never reaches a terminal status
//!
//! All timing tests run on tokio's paused clock, so elapsed times are exact
//! multiples of the poll interval.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use sfapi_hal::{HalError, HalResult, JobHandle, JobId, JobSpec, JobStatus, JobSubmitter, PollPolicy};
use sfapi_sched::{BatchRunner, ConcurrencyGate, SchedError};
use tokio::time::Instant;

struct SimJob {
    finishes_at: Option<Instant>,
    fails: bool,
    terminal_seen: bool,
}

#[derive(Default)]
struct SimulatedCluster {
    jobs: Mutex<FxHashMap<String, SimJob>>,
    next_id: AtomicUsize,
    submits: AtomicUsize,
    polls: AtomicUsize,
    late_polls: AtomicUsize,
    cancels: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SimulatedCluster {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

fn parse_secs(arg: Option<&str>) -> Duration {
    Duration::from_secs(arg.and_then(|s| s.parse().ok()).unwrap_or(1))
}

#[async_trait]
impl JobSubmitter for SimulatedCluster {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn submit(&self, spec: &JobSpec) -> HalResult<JobHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);

        let mut words = spec.script().split_whitespace();
        let (finishes_at, fails) = match words.next() {
            Some("run") => (Some(Instant::now() + parse_secs(words.next())), false),
            Some("fail") => (Some(Instant::now() + parse_secs(words.next())), true),
            Some("hang") => (None, false),
            _ => {
                return Err(HalError::SubmissionFailed(format!(
                    "sbatch: error: invalid script {:?}",
                    spec.script()
                )));
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.jobs.lock().unwrap().insert(
            id.clone(),
            SimJob {
                finishes_at,
                fails,
                terminal_seen: false,
            },
        );

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(JobHandle::new(id, JobStatus::Queued)
            .with_submitter(self.name())
            .with_name(spec.name()))
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| HalError::JobNotFound(job_id.to_string()))?;

        if job.terminal_seen {
            self.late_polls.fetch_add(1, Ordering::SeqCst);
        }

        match job.finishes_at {
            Some(at) if Instant::now() >= at => {
                if !job.terminal_seen {
                    job.terminal_seen = true;
                    self.active.fetch_sub(1, Ordering::SeqCst);
                }
                if job.fails {
                    Ok(JobStatus::Failed("FAILED".into()))
                } else {
                    Ok(JobStatus::Completed)
                }
            }
            _ => Ok(JobStatus::Running),
        }
    }

    async fn cancel(&self, _job_id: &JobId) -> HalResult<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn runner(cluster: &Arc<SimulatedCluster>) -> BatchRunner {
    BatchRunner::new(cluster.clone()).with_policy(
        PollPolicy::new(Duration::from_secs(1)).with_max_wait(Duration::from_secs(600)),
    )
}

fn named(script: &str, name: &str) -> JobSpec {
    JobSpec::new(script).with_name(name)
}

#[tokio::test(start_paused = true)]
async fn test_active_jobs_never_exceed_limit() {
    let cluster = SimulatedCluster::new();
    let specs: Vec<_> = [3, 1, 4, 1, 5, 9, 2, 6]
        .iter()
        .map(|secs| JobSpec::new(format!("run {secs}")))
        .collect();

    let results = runner(&cluster).run_all(&specs, 3).await.unwrap();

    assert_eq!(results.len(), specs.len());
    assert!(results.all_completed());
    assert_eq!(cluster.max_active(), 3);
    assert_eq!(cluster.active.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_output_order_follows_input_order() {
    let cluster = SimulatedCluster::new();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let order = Arc::clone(&finished);

    let specs = vec![named("run 5", "slow"), named("run 1", "fast")];
    let results = runner(&cluster)
        .on_complete(move |index, _| order.lock().unwrap().push(index))
        .run_all(&specs, 2)
        .await
        .unwrap();

    assert_eq!(*finished.lock().unwrap(), vec![1, 0]);

    let first = results.get(0).unwrap().as_ref().unwrap();
    let second = results.get(1).unwrap().as_ref().unwrap();
    assert_eq!(first.name.as_deref(), Some("slow"));
    assert_eq!(second.name.as_deref(), Some("fast"));
    assert!(first.finished_at >= second.finished_at);
}

#[tokio::test(start_paused = true)]
async fn test_submission_error_is_isolated() {
    let cluster = SimulatedCluster::new();
    let specs = vec![
        named("run 2", "a"),
        named("reject", "b"),
        named("fail 1", "c"),
        named("run 1", "d"),
    ];

    let results = runner(&cluster).run_all(&specs, 2).await.unwrap();
    let slots = results.into_vec();

    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].as_ref().unwrap().status, JobStatus::Completed);
    assert!(matches!(slots[1], Err(HalError::SubmissionFailed(_))));
    assert_eq!(
        slots[2].as_ref().unwrap().status,
        JobStatus::Failed("FAILED".into())
    );
    assert_eq!(slots[3].as_ref().unwrap().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_no_polls_after_terminal_status() {
    let cluster = SimulatedCluster::new();
    let specs: Vec<_> = (1..=4).map(|s| JobSpec::new(format!("run {s}"))).collect();

    let results = runner(&cluster).run_all(&specs, 4).await.unwrap();

    assert_eq!(cluster.late_polls.load(Ordering::SeqCst), 0);
    // A job running for `s` seconds is polled at t = 0, 1, ..., s.
    let polls: Vec<u32> = results.handles().map(|(_, h)| h.polls).collect();
    assert_eq!(polls, vec![2, 3, 4, 5]);
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 14);
}

#[tokio::test(start_paused = true)]
async fn test_limit_one_runs_sequentially() {
    let cluster = SimulatedCluster::new();
    let specs = vec![
        named("run 3", "A"),
        named("run 3", "B"),
        named("run 3", "C"),
    ];

    let start = Instant::now();
    let results = runner(&cluster).run_all(&specs, 1).await.unwrap();
    let elapsed = start.elapsed();

    assert!(results.all_completed());
    assert_eq!(cluster.max_active(), 1);
    assert!(
        elapsed >= Duration::from_secs(9) && elapsed < Duration::from_secs(10),
        "expected sum of durations, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_limit_two_runs_concurrently() {
    let cluster = SimulatedCluster::new();
    let specs = vec![named("run 3", "A"), named("run 5", "B")];

    let start = Instant::now();
    let results = runner(&cluster).run_all(&specs, 2).await.unwrap();
    let elapsed = start.elapsed();

    assert!(results.all_completed());
    assert_eq!(cluster.max_active(), 2);
    assert!(
        elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6),
        "expected max of durations, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_only_affects_its_own_job() {
    let cluster = SimulatedCluster::new();
    let specs = vec![named("hang", "stuck"), named("run 2", "ok")];

    let results = BatchRunner::new(cluster.clone())
        .with_policy(PollPolicy::new(Duration::from_secs(1)).with_max_wait(Duration::from_secs(5)))
        .run_all(&specs, 2)
        .await
        .unwrap();

    assert!(matches!(results.get(0), Some(Err(HalError::Timeout { .. }))));
    assert_eq!(
        results.get(1).unwrap().as_ref().unwrap().status,
        JobStatus::Completed
    );
    assert_eq!(cluster.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_run_releases_permits() {
    let cluster = SimulatedCluster::new();
    let gate = ConcurrencyGate::new(2).unwrap();
    let specs: Vec<_> = (0..5).map(|_| JobSpec::new("hang")).collect();
    let batch = runner(&cluster);

    let outcome =
        tokio::time::timeout(Duration::from_secs(30), batch.run_with_gate(&specs, &gate)).await;

    assert!(outcome.is_err(), "hanging jobs should not finish");
    assert_eq!(gate.available(), 2);
    // Accepted jobs are abandoned, not cancelled remotely.
    assert_eq!(cluster.submits.load(Ordering::SeqCst), 2);
    assert_eq!(cluster.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shared_gate_bounds_two_runs() {
    let cluster = SimulatedCluster::new();
    let gate = ConcurrencyGate::new(2).unwrap();
    let left: Vec<_> = (0..3).map(|_| JobSpec::new("run 2")).collect();
    let right: Vec<_> = (0..3).map(|_| JobSpec::new("run 2")).collect();
    let batch = runner(&cluster);

    let (a, b) = tokio::join!(
        batch.run_with_gate(&left, &gate),
        batch.run_with_gate(&right, &gate)
    );

    assert!(a.unwrap().all_completed());
    assert!(b.unwrap().all_completed());
    assert_eq!(cluster.max_active(), 2);
}

#[tokio::test]
async fn test_zero_limit_makes_no_remote_calls() {
    let cluster = SimulatedCluster::new();
    let specs = vec![JobSpec::new("run 1")];

    let err = runner(&cluster).run_all(&specs, 0).await.unwrap_err();

    assert!(matches!(err, SchedError::ConfigError(_)));
    assert_eq!(cluster.submits.load(Ordering::SeqCst), 0);
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 0);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn results_are_complete_ordered_and_bounded(
            durations in prop::collection::vec(1u64..6, 0..10),
            limit in 1usize..5,
        ) {
            let cluster = SimulatedCluster::new();
            let specs: Vec<_> = durations
                .iter()
                .enumerate()
                .map(|(i, secs)| named(&format!("run {secs}"), &i.to_string()))
                .collect();

            let results = paused_runtime()
                .block_on(runner(&cluster).run_all(&specs, limit))
                .unwrap();

            prop_assert_eq!(results.len(), specs.len());
            prop_assert!(cluster.max_active() <= limit);
            for (i, slot) in results.iter().enumerate() {
                let handle = slot.as_ref().unwrap();
                let expected = i.to_string();
                prop_assert_eq!(handle.name.as_deref(), Some(expected.as_str()));
            }
        }
    }
}
