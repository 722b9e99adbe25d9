//! Wait command implementation.
//!
//! Poll a single job until it reaches a terminal state.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use sfapi_hal::{HalError, JobHandle, JobStatus, JobSubmitter};

use super::common::{create_compute, styled_status};
use crate::config::CliConfig;

/// Execute the wait command.
pub async fn execute(
    config: &CliConfig,
    job_id: &str,
    machine: Option<&str>,
    timeout: Option<u64>,
) -> Result<()> {
    let compute = create_compute(&config.client, machine)?;

    let mut batch = config.batch.clone();
    if let Some(secs) = timeout {
        batch.max_wait_time_secs = secs;
    }
    batch.validate()?;
    let policy = batch.poll_policy();

    println!(
        "{} Waiting for job {} on {} (timeout: {}s)",
        style("→").cyan().bold(),
        style(job_id).dim(),
        compute.machine(),
        policy.max_wait.as_secs()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message(format!(
        "Polling every {}s...",
        policy.poll_interval.as_secs()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut handle = JobHandle::new(job_id, JobStatus::Queued).with_submitter(compute.name());
    let outcome = compute.wait_until_terminal(&mut handle, &policy).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(()) => {
            let mark = if handle.status.is_success() {
                style("✓").green().bold()
            } else {
                style("✗").red().bold()
            };
            println!(
                "{} Job {} finished: {} ({} polls)",
                mark,
                handle.id,
                styled_status(&handle.status),
                handle.polls
            );
            Ok(())
        }
        Err(HalError::Timeout { waited, .. }) => anyhow::bail!(
            "Timeout after {}s. Job {} is still {}. Use 'sfapi status {}' to check later.",
            waited.as_secs(),
            job_id,
            handle.status.name(),
            job_id
        ),
        Err(e) => Err(e.into()),
    }
}
