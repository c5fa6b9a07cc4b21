//! Lock-free counter driven by a compare-and-swap loop.
//!
//! [`AtomicCas`] reads the current value, then tries to swap in `value + 1`.
//! If another worker got there first the swap fails, hands back the newer
//! value, and the loop retries from it. Every successful swap moves the
//! counter by exactly one, so the post-increment values handed out form a
//! gap-free, strictly increasing sequence.
//!
//! Failed swaps are counted as `retries`, a direct measure of how contended
//! the cache line was during a run.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::strategies::{Observable, StrategyKind};

/// A counter incremented with `compare_exchange_weak`.
#[derive(Default)]
pub struct AtomicCas {
    value: CachePadded<AtomicU64>,
    retries: CachePadded<AtomicU64>,
}

impl AtomicCas {
    /// Creates a counter initialized to zero.
    pub const fn new() -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(0)),
            retries: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Increments the counter and returns the value it was moved to.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use contendere::strategies::atomic::AtomicCas;
    ///
    /// let counter = AtomicCas::new();
    /// assert_eq!(counter.increment(), 1);
    /// assert_eq!(counter.increment(), 2);
    /// ```
    #[inline]
    pub fn increment(&self) -> u64 {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            let next = current.wrapping_add(1);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => {
                    current = actual;
                    self.retries.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Increments the counter, discarding the new value.
    #[inline]
    pub fn apply(&self) {
        self.increment();
    }

    /// Number of failed swaps since the last reset.
    ///
    /// Spurious failures of the weak exchange are included.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Sets the counter and the retry tally back to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
    }
}

impl Observable for AtomicCas {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Atomic
    }

    #[inline]
    fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

impl Debug for AtomicCas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atomic{{ {} retries:{} }}", self.value(), self.retries())
    }
}
