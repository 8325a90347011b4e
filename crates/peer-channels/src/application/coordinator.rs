//! # Validation Coordinator
//!
//! A single counting limiter shared by every channel's validator. At most
//! `capacity` transactions are validated at once across the whole peer.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::warn;

use crate::domain::{ChannelError, ChannelResult};

/// Global bound on concurrent transaction validation.
#[derive(Debug, Clone)]
pub struct ValidationCoordinator {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One validation slot. Released on drop.
#[derive(Debug)]
pub struct ValidationPermit {
    _permit: OwnedSemaphorePermit,
}

impl ValidationCoordinator {
    /// A limiter with `workers` slots. Zero is raised to one.
    pub fn new(workers: usize) -> Self {
        let capacity = if workers == 0 {
            warn!("Validation pool size of 0 requested, using 1");
            1
        } else {
            workers
        };
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> ChannelResult<ValidationPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ChannelError::ValidationCapacityClosed)?;
        Ok(ValidationPermit { _permit: permit })
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> ChannelResult<Option<ValidationPermit>> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(ValidationPermit { _permit: permit })),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(ChannelError::ValidationCapacityClosed),
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(ValidationCoordinator::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let coordinator = ValidationCoordinator::new(1);
        let permit = coordinator.acquire().await.unwrap();
        assert_eq!(coordinator.available(), 0);
        assert!(coordinator.try_acquire().unwrap().is_none());
        drop(permit);
        assert_eq!(coordinator.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_capacity() {
        let coordinator = ValidationCoordinator::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _permit = coordinator.acquire().await.unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(coordinator.available(), 2);
    }
}
