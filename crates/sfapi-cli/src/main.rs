//! sfapi Command-Line Interface
//!
//! Submit batches of SLURM jobs to NERSC through the Superfacility API,
//! never running more than a configured number at once.
//!
//! ```text
//! sfapi batch hello.sh --count 10 --concurrency 2
//! sfapi status                      # machine status, no credentials needed
//! sfapi status 3394948              # job state
//! sfapi wait 3394948 --timeout 600
//! sfapi cancel 3394948
//! sfapi auth status
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::batch::BatchOptions;
use commands::{auth, batch, cancel, status, wait};
use config::CliConfig;

/// sfapi - bounded-concurrency batch submission for the NERSC Superfacility API
#[derive(Parser, Debug)]
#[command(name = "sfapi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (default: ~/.config/sfapi/config.yaml)
    #[arg(short, long, global = true, env = "SFAPI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit one job per value of a script template and wait for all of them
    Batch {
        /// Script template; every `{}` is replaced by the value
        template: PathBuf,

        /// Submit COUNT jobs with values 0..COUNT
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Substitution value (repeatable)
        #[arg(long = "value")]
        values: Vec<String>,

        /// Maximum number of simultaneously active jobs
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Seconds between status polls
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Target machine (perlmutter, dtns)
        #[arg(short, long)]
        machine: Option<String>,

        /// Print a JSON report instead of a table
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show machine status, or a job's state when a job ID is given
    Status {
        /// SLURM job ID
        job_id: Option<String>,

        /// Target machine
        #[arg(short, long)]
        machine: Option<String>,
    },

    /// Wait for a job to reach a terminal state
    Wait {
        /// SLURM job ID
        job_id: String,

        /// Target machine
        #[arg(short, long)]
        machine: Option<String>,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Cancel a job
    Cancel {
        /// SLURM job ID
        job_id: String,

        /// Target machine
        #[arg(short, long)]
        machine: Option<String>,
    },

    /// Inspect credentials
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    /// Show which credentials are configured and whether they work
    Status,

    /// Print an access token to stdout
    Token,
}

fn init_logging(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let result = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, config: CliConfig) -> anyhow::Result<()> {
    match command {
        Commands::Batch {
            template,
            count,
            values,
            concurrency,
            poll_interval,
            machine,
            json,
            output,
        } => {
            batch::execute(
                config,
                BatchOptions {
                    template,
                    values,
                    count,
                    concurrency,
                    poll_interval,
                    machine,
                    json,
                    output,
                },
            )
            .await
        }

        Commands::Status { job_id, machine } => {
            status::execute(&config, machine.as_deref(), job_id.as_deref()).await
        }

        Commands::Wait {
            job_id,
            machine,
            timeout,
        } => wait::execute(&config, &job_id, machine.as_deref(), timeout).await,

        Commands::Cancel { job_id, machine } => {
            cancel::execute(&config, &job_id, machine.as_deref()).await
        }

        Commands::Auth { action } => match action {
            AuthAction::Status => auth::execute_status(&config).await,
            AuthAction::Token => auth::execute_token(&config).await,
        },
    }
}
