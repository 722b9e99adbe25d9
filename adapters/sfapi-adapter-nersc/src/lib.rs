//! sfapi adapter for the NERSC Superfacility API
//!
//! This crate submits batch scripts to NERSC machines over the
//! Superfacility REST API and tracks them through SLURM accounting.
//!
//! # Supported Machines
//!
//! | Machine | API name | Notes |
//! |---------|----------|-------|
//! | Perlmutter | `perlmutter` | CPU and GPU partitions |
//! | Data transfer nodes | `dtns` | |
//! | Cori | `cori` | retired; accounting queries only |
//!
//! # Authentication
//!
//! Public endpoints (system status) need no credentials. Job submission and
//! queries need a bearer token, either a pre-issued one:
//!
//! ```bash
//! export SFAPI_TOKEN="eyJhbGciOi..."
//! ```
//!
//! or an OAuth2 client registered in Iris, exchanged through
//! [`ClientCredentialsAuth`](sfapi_hal::ClientCredentialsAuth).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sfapi_adapter_nersc::{Machine, SfApiClient};
//! use sfapi_hal::{EnvTokenProvider, JobSpec, JobSubmitter, PollPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SfApiClient::new()?
//!         .with_token_provider(Arc::new(EnvTokenProvider::sfapi()));
//!
//!     let status = client.get_status(Machine::Perlmutter).await?;
//!     println!("perlmutter is {}", status.status);
//!
//!     let perlmutter = client.compute(Machine::Perlmutter)?;
//!     let mut job = perlmutter.submit(&JobSpec::new(SCRIPT)).await?;
//!     perlmutter
//!         .wait_until_terminal(&mut job, &PollPolicy::default())
//!         .await?;
//!     println!("{} finished: {}", job.id, job.status);
//!     Ok(())
//! }
//! ```

mod api;
mod backend;
mod error;
mod machine;
mod state;

pub use api::{
    BASE_URL, JobQueryResponse, JobRecord, SfApiClient, SubmitResponse, SystemStatus,
    TaskResponse, TaskResult,
};
pub use backend::{Compute, TASK_MAX_POLL_FAILURES, TASK_MAX_WAIT, TASK_POLL_INTERVAL};
pub use error::{NerscError, NerscResult};
pub use machine::Machine;
pub use state::parse_slurm_state;

// Re-export common types
pub use sfapi_hal::{JobSubmitter, PollPolicy};
