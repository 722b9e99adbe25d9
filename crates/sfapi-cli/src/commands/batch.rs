//! Batch command implementation.
//!
//! Expand a script template into one job per value, submit them with a
//! concurrency cap, and report every outcome in input order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use sfapi_hal::{HalResult, JobHandle, JobSpec};
use sfapi_sched::{BatchRunner, ResultSet, SlotSummary};

use super::common::{create_compute, styled_status};
use crate::config::CliConfig;

/// Options for one `sfapi batch` invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Script template; `{}` is replaced by each value.
    pub template: PathBuf,
    /// Explicit substitution values.
    pub values: Vec<String>,
    /// Use `0..count` as values.
    pub count: Option<usize>,
    /// Override `batch.concurrency`.
    pub concurrency: Option<usize>,
    /// Override `batch.poll_interval_secs`.
    pub poll_interval: Option<u64>,
    /// Override `client.machine`.
    pub machine: Option<String>,
    /// Print a JSON report instead of a table.
    pub json: bool,
    /// Write the JSON report to a file.
    pub output: Option<PathBuf>,
}

/// JSON report of a batch run.
#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    run_id: Uuid,
    machine: String,
    concurrency: usize,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    jobs: Vec<SlotSummary<'a>>,
}

/// Substitution values: explicit ones, or `0..count`.
fn substitution_values(values: &[String], count: Option<usize>) -> Result<Vec<String>> {
    match (values.is_empty(), count) {
        (false, None) => Ok(values.to_vec()),
        (true, Some(n)) => Ok((0..n).map(|i| i.to_string()).collect()),
        (false, Some(_)) => anyhow::bail!("Use either --value or --count, not both"),
        (true, None) => anyhow::bail!("Nothing to submit: pass --count N or one or more --value"),
    }
}

/// Build one spec per value from a template file.
fn build_specs(template_path: &Path, values: &[String]) -> Result<Vec<JobSpec>> {
    let template = fs::read_to_string(template_path)
        .with_context(|| format!("Failed to read template: {}", template_path.display()))?;

    if !template.contains("{}") {
        anyhow::bail!(
            "Template {} has no '{{}}' placeholder",
            template_path.display()
        );
    }

    let stem = template_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("job");

    Ok(values
        .iter()
        .map(|v| JobSpec::from_template(&template, v).with_name(format!("{stem}-{v}")))
        .collect())
}

/// One line per finished job, printed above the progress bar.
fn completion_line(index: usize, outcome: &HalResult<JobHandle>) -> String {
    match outcome {
        Ok(handle) => format!(
            "  {} #{index} job {} {}",
            if handle.status.is_success() {
                style("✓").green().bold()
            } else {
                style("✗").red().bold()
            },
            style(&handle.id).dim(),
            styled_status(&handle.status),
        ),
        Err(e) => format!("  {} #{index} {}", style("✗").red().bold(), style(e).red()),
    }
}

/// Execute the batch command.
pub async fn execute(config: CliConfig, opts: BatchOptions) -> Result<()> {
    let values = substitution_values(&opts.values, opts.count)?;
    let specs = build_specs(&opts.template, &values)?;

    let mut batch = config.batch.clone();
    if let Some(n) = opts.concurrency {
        batch.concurrency = n;
    }
    if let Some(secs) = opts.poll_interval {
        batch.poll_interval_secs = secs;
    }
    batch.validate()?;

    let compute = create_compute(&config.client, opts.machine.as_deref())?;
    let machine = compute.machine();
    let run_id = Uuid::new_v4();

    println!(
        "{} Submitting {} jobs to {} ({} at a time)",
        style("→").cyan().bold(),
        specs.len(),
        style(machine).yellow(),
        batch.concurrency
    );
    info!(%run_id, %machine, jobs = specs.len(), "starting batch");

    let progress = ProgressBar::new(specs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(200));

    let hook_progress = progress.clone();
    let runner = BatchRunner::new(Arc::new(compute))
        .with_policy(batch.poll_policy())
        .on_complete(move |index, outcome| {
            hook_progress.println(completion_line(index, outcome));
            hook_progress.inc(1);
        });

    let started_at = Utc::now();
    let results = tokio::select! {
        results = runner.run_all(&specs, batch.concurrency) => results?,
        _ = tokio::signal::ctrl_c() => {
            progress.abandon_with_message("interrupted");
            anyhow::bail!(
                "Interrupted. Jobs already accepted keep running on {machine}; see 'sfapi status'."
            );
        }
    };
    let finished_at = Utc::now();
    progress.finish_and_clear();

    if opts.json || opts.output.is_some() {
        let report = BatchReport {
            run_id,
            machine: machine.to_string(),
            concurrency: batch.concurrency,
            started_at,
            finished_at,
            jobs: results.summary(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        match &opts.output {
            Some(path) => {
                fs::write(path, json)
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
                println!(
                    "{} Report written to {}",
                    style("✓").green().bold(),
                    path.display()
                );
            }
            None => println!("{json}"),
        }
    } else {
        print_table(&results);
    }

    let errors = results.errors().count();
    if errors > 0 {
        anyhow::bail!("{errors} of {} jobs did not finish", results.len());
    }
    Ok(())
}

fn print_table(results: &ResultSet) {
    println!(
        "\n  {:<4}  {:<24}  {:<12}  {:<10}  {}",
        style("#").bold(),
        style("NAME").bold(),
        style("JOB ID").bold(),
        style("STATUS").bold(),
        style("FINISHED").bold()
    );
    println!("  {}", "-".repeat(72));

    for (index, slot) in results.iter().enumerate() {
        match slot {
            Ok(handle) => println!(
                "  {:<4}  {:<24}  {:<12}  {:<10}  {}",
                index,
                handle.name.as_deref().unwrap_or("-"),
                handle.id,
                styled_status(&handle.status),
                handle
                    .finished_at
                    .map_or_else(|| "-".to_string(), |t| t.format("%H:%M:%S").to_string()),
            ),
            Err(e) => println!("  {:<4}  {}", index, style(e).red()),
        }
    }

    println!(
        "\n{} {}/{} completed",
        style("→").cyan().bold(),
        results.completed_count(),
        results.len()
    );
}
