//! Counter guarded by a suspending mutual-exclusion lock.
//!
//! The lock is a [`tokio::sync::Mutex`]: a worker that finds it held is
//! parked on the lock's wait queue and its runtime thread moves on to other
//! tasks. The guard covers the whole read-increment-write region and is
//! released when it goes out of scope, including when the holding task is
//! cancelled.
//!
//! While holding the lock the worker also publishes the new value into a
//! relaxed atomic, so progress readers never have to queue behind workers.
//! Only the lock holder writes that view.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::strategies::{Observable, StrategyKind};

/// A counter incremented under a `tokio::sync::Mutex`.
#[derive(Default)]
pub struct MutexCounter {
    value: Mutex<u64>,
    published: AtomicU64,
}

impl MutexCounter {
    /// Creates a counter initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, increments, and releases it.
    pub async fn apply(&self) {
        let mut guard = self.value.lock().await;
        *guard += 1;
        self.published.store(*guard, Ordering::Relaxed);
    }

    /// Reads the counter under the lock.
    pub async fn locked_value(&self) -> u64 {
        *self.value.lock().await
    }

    /// Sets the counter back to zero.
    pub async fn reset(&self) {
        let mut guard = self.value.lock().await;
        *guard = 0;
        self.published.store(0, Ordering::Relaxed);
    }
}

impl Observable for MutexCounter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mutex
    }

    fn value(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Debug for MutexCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mutex{{ {} }}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_apply() {
        let counter = MutexCounter::new();
        counter.apply().await;
        counter.apply().await;
        assert_eq!(counter.value(), 2);
        assert_eq!(counter.locked_value().await, 2);
    }

    #[tokio::test]
    async fn test_reset() {
        let counter = MutexCounter::new();
        counter.apply().await;
        counter.reset().await;
        assert_eq!(counter.value(), 0);
        assert_eq!(counter.locked_value().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_tasks_exact() {
        let counter = Arc::new(MutexCounter::new());
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            tasks.spawn(async move {
                for _ in 0..500 {
                    counter.apply().await;
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        assert_eq!(counter.locked_value().await, 32_000);
        assert_eq!(counter.value(), 32_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_waiter_does_not_wedge_lock() {
        let counter = Arc::new(MutexCounter::new());

        // hold the lock so the next apply has to wait
        let guard = counter.value.lock().await;
        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.apply().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        drop(guard);

        counter.apply().await;
        assert_eq!(counter.locked_value().await, 1);
    }
}
