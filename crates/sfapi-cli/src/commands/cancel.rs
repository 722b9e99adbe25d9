//! Cancel command implementation.

use anyhow::Result;
use console::style;

use sfapi_hal::{JobId, JobSubmitter};

use super::common::create_compute;
use crate::config::CliConfig;

/// Execute the cancel command.
pub async fn execute(config: &CliConfig, job_id: &str, machine: Option<&str>) -> Result<()> {
    let compute = create_compute(&config.client, machine)?;
    compute.cancel(&JobId::new(job_id)).await?;

    println!(
        "{} Cancellation requested for job {} on {}",
        style("✓").green().bold(),
        style(job_id).dim(),
        compute.machine()
    );
    Ok(())
}
