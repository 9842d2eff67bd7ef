//! Admission control for inbound replay connections

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed number of connection slots shared by the accept loop
#[derive(Clone)]
pub struct ConnectionPool {
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionPool {
    /// Create a pool with `max_connections` slots
    ///
    /// # Panics
    ///
    /// Panics if `max_connections` is 0
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        assert!(max_connections > 0, "max_connections must be > 0");

        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Claim a slot without waiting; `None` when every slot is taken
    pub fn try_acquire(&self) -> Option<ConnectionGuard> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| ConnectionGuard { _permit: permit })
    }

    /// Slots currently held by live connections
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Total number of slots
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A held slot, returned to the pool on drop
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
}
