//! Admission control for concurrently active jobs.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{SchedError, SchedResult};

/// Counting gate bounding how many jobs are active at once.
///
/// Backed by a fair (FIFO) semaphore sized to `limit`. Clones share the same
/// counter. A permit is returned to the gate when its [`GatePermit`] is
/// dropped, including when the future holding it is cancelled.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// One admitted slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` holders.
    ///
    /// # Errors
    ///
    /// `ConfigError` if `limit` is zero or exceeds the semaphore maximum.
    pub fn new(limit: usize) -> SchedResult<Self> {
        if limit == 0 {
            return Err(SchedError::ConfigError(
                "concurrency limit must be at least 1".into(),
            ));
        }
        if limit > Semaphore::MAX_PERMITS {
            return Err(SchedError::ConfigError(format!(
                "concurrency limit {limit} exceeds maximum of {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> SchedResult<GatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SchedError::GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.limit - self.available()
    }

    /// Close the gate. Pending and future `acquire` calls fail with
    /// `GateClosed`; permits already handed out stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
