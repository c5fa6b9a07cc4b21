//! Counter updated with no synchronization at all.
//!
//! [`Unguarded`] is the control group. Its increment is a load followed by
//! an independent store, so two workers that read the same value both write
//! back `value + 1` and one increment vanishes (a *lost update*). The cell is
//! atomic only so that the race stays a logic race and never becomes a data
//! race: each individual load and store is well defined, their pairing is
//! not.
//!
//! # Examples
//!
//! ```rust
//! use contendere::strategies::unguarded::Unguarded;
//! use contendere::strategies::Observable;
//!
//! let counter = Unguarded::new();
//! counter.apply();
//! counter.apply();
//! // Single-threaded use never loses anything.
//! assert_eq!(counter.value(), 2);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::strategies::{Observable, StrategyKind};

/// A counter incremented by a racy read-modify-write.
#[derive(Default)]
pub struct Unguarded {
    value: CachePadded<AtomicU64>,
}

impl Unguarded {
    /// Creates a counter initialized to zero.
    pub const fn new() -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Reads the counter, adds one and writes it back.
    ///
    /// Concurrent callers may overwrite each other.
    #[inline]
    pub fn apply(&self) {
        let current = self.value.load(Ordering::Relaxed);
        self.value.store(current.wrapping_add(1), Ordering::Relaxed);
    }

    /// Sets the counter back to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Observable for Unguarded {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unguarded
    }

    #[inline]
    fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Debug for Unguarded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unguarded{{ {} }}", self.value())
    }
}
