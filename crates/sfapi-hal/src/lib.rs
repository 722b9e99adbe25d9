//! sfapi Hardware Abstraction Layer
//!
//! Core types shared by every crate in the workspace: the job model, the
//! [`JobSubmitter`] trait that remote batch APIs implement, the polling
//! policy used to wait for terminal states, and token providers.
//!
//! # Overview
//!
//! - [`JobSpec`] is the script to submit; [`JobHandle`] is what comes back.
//! - [`JobSubmitter::wait_until_terminal`] polls a handle until the remote
//!   scheduler reports `Completed`, `Failed` or `Cancelled`.
//! - [`HalError`] is the per-job error taxonomy (configuration, submission,
//!   transport, timeout).
//!
//! # Example
//!
//! ```ignore
//! use sfapi_hal::{JobSpec, JobSubmitter, PollPolicy};
//!
//! let spec = JobSpec::new("#!/bin/bash\n#SBATCH --qos=debug\nhostname\n");
//! let mut handle = submitter.submit(&spec).await?;
//! submitter
//!     .wait_until_terminal(&mut handle, &PollPolicy::default())
//!     .await?;
//! println!("{} finished: {}", handle.id, handle.status);
//! ```
//!
//! # Implementing a Submitter
//!
//! ```ignore
//! use async_trait::async_trait;
//! use sfapi_hal::{HalResult, JobHandle, JobId, JobSpec, JobStatus, JobSubmitter};
//!
//! struct MySubmitter;
//!
//! #[async_trait]
//! impl JobSubmitter for MySubmitter {
//!     fn name(&self) -> &str { "mine" }
//!
//!     async fn submit(&self, spec: &JobSpec) -> HalResult<JobHandle> {
//!         # todo!()
//!     }
//!
//!     async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
//!         # todo!()
//!     }
//!
//!     async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
//!         # todo!()
//!     }
//! }
//! ```

pub mod auth;
pub mod error;
pub mod job;
pub mod submitter;

pub use auth::{
    CachedToken, ClientCredentialsAuth, ClientCredentialsConfig, EnvTokenProvider,
    StaticTokenProvider, TokenProvider,
};
pub use error::{HalError, HalResult};
pub use job::{JobHandle, JobId, JobSpec, JobStatus, StatusReport};
pub use submitter::{JobSubmitter, PollPolicy};
