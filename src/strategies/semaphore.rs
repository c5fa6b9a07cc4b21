//! Counter guarded by a counting semaphore holding a single permit.
//!
//! Behaviourally this is the mutex strategy again, expressed as resource
//! acquisition: a worker takes the only permit, bumps the counter, and the
//! permit returns to the pool when dropped. The counter itself is accessed
//! with a plain load and store, the same racy pair [`Unguarded`] uses; the
//! permit alone is what turns it into an exact count.
//!
//! [`Unguarded`]: crate::strategies::unguarded::Unguarded

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Semaphore;

use crate::error::{HarnessError, Result};
use crate::strategies::{Observable, StrategyKind};

/// Number of permits in the pool. One makes the semaphore a lock.
pub const PERMITS: usize = 1;

/// A counter incremented while holding the single permit of a semaphore.
pub struct SemaphoreCounter {
    permits: Semaphore,
    value: AtomicU64,
}

impl SemaphoreCounter {
    /// Creates a counter initialized to zero with a one-permit pool.
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(PERMITS),
            value: AtomicU64::new(0),
        }
    }

    /// Acquires the permit, increments, and releases the permit.
    ///
    /// Fails only if the semaphore was closed, which the harness never does.
    pub async fn apply(&self) -> Result<()> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| HarnessError::SemaphoreClosed)?;
        let current = self.value.load(Ordering::Relaxed);
        self.value.store(current + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Permits currently available; `PERMITS` whenever no worker is inside.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Sets the counter back to zero.
    pub async fn reset(&self) {
        let _permit = self.permits.acquire().await.ok();
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Default for SemaphoreCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for SemaphoreCounter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semaphore
    }

    fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Debug for SemaphoreCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "semaphore{{ {} permits:{} }}",
            self.value(),
            self.available_permits()
        )
    }
}
