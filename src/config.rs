//! Run configuration.
//!
//! [`HarnessConfig`] fixes the worker population, the per-worker iteration
//! budget and the broadcast buffer size. The defaults reproduce the
//! reference workload: 1000 workers × 100 increments = 100 000 per strategy.
//!
//! # Examples
//!
//! ```rust
//! use contendere::config::HarnessConfig;
//!
//! let config = HarnessConfig::default().with_workers(8).with_iterations(50);
//! assert_eq!(config.target(), 400);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::{ITERATIONS, TARGET, WORKERS};

/// Default upper bound on waiting for the broadcast subscriber to catch up.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HarnessConfig {
    /// Number of worker tasks spawned per run.
    pub workers: usize,
    /// Increments each worker applies to every strategy.
    pub iterations: usize,
    /// Capacity of the broadcast ring buffer.
    ///
    /// Events published while the buffer is full overwrite the oldest ones
    /// and are lost to the subscriber.
    pub broadcast_capacity: usize,
    /// How long shutdown waits for the broadcast subscriber to drain its
    /// buffer before cancelling it.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub settle_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: WORKERS,
            iterations: ITERATIONS,
            broadcast_capacity: TARGET as usize,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    ///
    /// The broadcast capacity is not adjusted; call
    /// [`with_broadcast_capacity`](Self::with_broadcast_capacity) or
    /// [`sized_for_target`](Self::sized_for_target) as needed.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-worker iteration budget.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the broadcast buffer capacity.
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Sets the broadcast settle timeout.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Resizes the broadcast buffer so that a whole run fits without drops.
    pub fn sized_for_target(mut self) -> Self {
        self.broadcast_capacity = (self.target() as usize).max(1);
        self
    }

    /// Number of increments every safe strategy must end a run with.
    pub fn target(&self) -> u64 {
        (self.workers as u64).saturating_mul(self.iterations as u64)
    }

    /// Whether the broadcast buffer can hold an entire run's events.
    pub fn broadcast_is_lossless(&self) -> bool {
        self.broadcast_capacity as u64 >= self.target()
    }

    /// Checks the configuration describes a runnable workload.
    pub fn validate(&self) -> Result<()> {
        if self.broadcast_capacity == 0 {
            return Err(HarnessError::InvalidConfig(
                "broadcast capacity must be greater than zero".to_string(),
            ));
        }
        // tokio rejects broadcast capacities above this bound
        if self.broadcast_capacity > usize::MAX >> 1 {
            return Err(HarnessError::InvalidConfig(format!(
                "broadcast capacity {} is too large",
                self.broadcast_capacity
            )));
        }
        if (self.workers as u64)
            .checked_mul(self.iterations as u64)
            .is_none()
        {
            return Err(HarnessError::InvalidConfig(format!(
                "{} workers × {} iterations overflows the counters",
                self.workers, self.iterations
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = HarnessConfig::default();
        assert_eq!(config.workers, 1000);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.target(), 100_000);
        assert!(config.broadcast_is_lossless());
    }

    #[test]
    fn test_builder() {
        let config = HarnessConfig::new()
            .with_workers(4)
            .with_iterations(10)
            .with_broadcast_capacity(8)
            .with_settle_timeout(Duration::from_millis(10));
        assert_eq!(config.target(), 40);
        assert_eq!(config.broadcast_capacity, 8);
        assert_eq!(config.settle_timeout, Duration::from_millis(10));
        assert!(!config.broadcast_is_lossless());
    }

    #[test]
    fn test_sized_for_target() {
        let config = HarnessConfig::new()
            .with_workers(3)
            .with_iterations(7)
            .with_broadcast_capacity(1)
            .sized_for_target();
        assert_eq!(config.broadcast_capacity, 21);

        let empty = HarnessConfig::new().with_workers(0).sized_for_target();
        assert_eq!(empty.broadcast_capacity, 1);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = HarnessConfig::new().with_broadcast_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_huge_capacity() {
        let config = HarnessConfig::new().with_broadcast_capacity(usize::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_is_valid() {
        let config = HarnessConfig::new().with_workers(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.target(), 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip_uses_millis() {
        let config = HarnessConfig::new().with_settle_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"settle_timeout\":250"));

        let partial: HarnessConfig = serde_json::from_str(r#"{"workers":2}"#).unwrap();
        assert_eq!(partial.workers, 2);
        assert_eq!(partial.iterations, ITERATIONS);
    }
}
