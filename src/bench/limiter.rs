//! Counting admission gate for in-flight invocations.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of invocations in flight across the whole process.
///
/// Units are handed out as [`LimiterPermit`]s and returned when the permit
/// is dropped, so a unit comes back on every exit path of the holder,
/// including failure and task abort.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One held unit of a [`ConcurrencyLimiter`]
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` units (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a unit is free and take it. Waiters are served in FIFO order.
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        LimiterPermit { _permit: permit }
    }

    /// Units not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured ceiling
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently held
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}

impl LimiterPermit {
    /// Give the unit back now instead of at the end of the scope
    pub fn release(self) {}
}
