//! Status command implementation.
//!
//! Without a job id, show the machine's operational status (no credentials
//! needed). With one, show the job's SLURM state.

use anyhow::Result;
use console::style;

use super::common::{create_client, create_compute, resolve_machine, styled_status};
use crate::config::CliConfig;

/// Execute the status command.
pub async fn execute(config: &CliConfig, machine: Option<&str>, job_id: Option<&str>) -> Result<()> {
    let Some(job_id) = job_id else {
        return system_status(config, machine).await;
    };

    let compute = create_compute(&config.client, machine)?;
    let status = compute.job_state(job_id).await?;

    println!(
        "{} Job {} on {}: {}",
        style("→").cyan().bold(),
        style(job_id).dim(),
        compute.machine(),
        styled_status(&status).bold()
    );
    if let sfapi_hal::JobStatus::Failed(reason) | sfapi_hal::JobStatus::Unknown(reason) = &status {
        println!("  SLURM state: {reason}");
    }

    Ok(())
}

async fn system_status(config: &CliConfig, machine: Option<&str>) -> Result<()> {
    let machine = resolve_machine(&config.client, machine)?;
    let client = create_client(&config.client)?;
    let status = client.get_status(machine).await?;

    let styled = if status.is_active() {
        style(status.status.as_str()).green().bold()
    } else {
        style(status.status.as_str()).red().bold()
    };

    println!(
        "{} {}: {}",
        style("→").cyan().bold(),
        status.full_name.as_deref().unwrap_or(&status.name),
        styled
    );
    if let Some(description) = &status.description {
        println!("  {description}");
    }
    for note in &status.notes {
        println!("  {} {note}", style("•").dim());
    }
    if let Some(updated) = &status.updated_at {
        println!("  {}", style(format!("updated {updated}")).dim());
    }

    Ok(())
}
