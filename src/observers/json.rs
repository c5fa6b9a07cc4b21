//! JSON observer for serializing results.
//!
//! [`JsonObserver`] serializes a [`ResultsSnapshot`] or a [`RunReport`]
//! with serde, optionally pretty-printed and optionally wrapped in an
//! object carrying the capture time.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! contendere = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use contendere::observers::json::JsonObserver;
//!
//! let json = JsonObserver::new().to_json(&orchestrator.snapshot())?;
//! // {"state":"completed","target":100000,"counts":[{"kind":"unguarded","count":97312},...]}
//!
//! let json = JsonObserver::new().include_timestamp(true).to_json(&snapshot)?;
//! // {"timestamp_ms":1760000000000,"state":"completed",...}
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::observers::Result;
use crate::snapshot::{ResultsSnapshot, RunReport};

/// A serialized body tagged with the time it was captured.
///
/// The body's fields are flattened next to `timestamp_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stamped<T> {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// The wrapped value.
    #[serde(flatten)]
    pub body: T,
}

impl<T> Stamped<T> {
    /// Wraps a value with an explicit timestamp.
    pub fn new(body: T, timestamp_ms: u64) -> Self {
        Self { timestamp_ms, body }
    }

    /// Wraps a value with the current time.
    pub fn now(body: T) -> Self {
        Self::new(body, current_timestamp_ms())
    }
}

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the output.
    pub pretty: bool,
    /// Whether to wrap the output in a [`Stamped`] object.
    pub include_timestamp: bool,
}

/// Serializes snapshots and run reports to JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates an observer producing compact, unstamped JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer from an explicit configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables the `timestamp_ms` wrapper.
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.config.include_timestamp {
            let stamped = Stamped::now(value);
            if self.config.pretty {
                serde_json::to_string_pretty(&stamped)?
            } else {
                serde_json::to_string(&stamped)?
            }
        } else if self.config.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }

    /// Serializes a snapshot.
    pub fn to_json(&self, snapshot: &ResultsSnapshot) -> Result<String> {
        self.encode(snapshot)
    }

    /// Serializes a run report, including the embedded final snapshot.
    pub fn report_to_json(&self, report: &RunReport) -> Result<String> {
        self.encode(report)
    }

    /// Serializes a snapshot and writes it, newline-terminated, to `out`.
    pub fn write_to(&self, snapshot: &ResultsSnapshot, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{}", self.to_json(snapshot)?)?;
        Ok(())
    }
}

/// Returns the current time in milliseconds since the Unix epoch.
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
