//! Bounded-concurrency batch submission.
//!
//! Submits a list of [`JobSpec`](sfapi_hal::JobSpec)s through any
//! [`JobSubmitter`](sfapi_hal::JobSubmitter), keeping at most `limit` jobs
//! active (submitted and not yet terminal) at any time, and returns one
//! result per spec in input order.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sfapi_hal::{JobSpec, PollPolicy};
//! use sfapi_sched::BatchRunner;
//!
//! let specs: Vec<_> = (0..10)
//!     .map(|n| JobSpec::from_template(SCRIPT, n))
//!     .collect();
//!
//! let runner = BatchRunner::new(Arc::new(perlmutter))
//!     .with_policy(PollPolicy::new(Duration::from_secs(30)));
//! let results = runner.run_all(&specs, 2).await?;
//!
//! for (i, slot) in results.iter().enumerate() {
//!     match slot {
//!         Ok(handle) => println!("{i}: {} {}", handle.id, handle.status),
//!         Err(e) => println!("{i}: {e}"),
//!     }
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod gate;
pub mod result;

pub use batch::{BatchRunner, CompletionHook};
pub use config::BatchConfig;
pub use error::{SchedError, SchedResult};
pub use gate::{ConcurrencyGate, GatePermit};
pub use result::{ResultSet, SlotSummary};
