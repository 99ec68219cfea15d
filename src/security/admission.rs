//! Concurrency admission control.
//!
//! A fixed pool of permits. Acquisition never waits: when the pool is
//! empty the request is shed with 429 instead of queued. The permit is a
//! guard, so it returns to the pool on every exit path, panics included.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::observability::metrics;

/// Bounds the number of requests processed concurrently.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => {
                metrics::permit_acquired();
                Some(AdmissionPermit { _permit: permit })
            }
            Err(TryAcquireError::NoPermits) => None,
            // The semaphore is never closed.
            Err(TryAcquireError::Closed) => None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// The right to occupy one processing slot.
///
/// When dropped, the slot is released back to the pool.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        metrics::permit_released();
    }
}
