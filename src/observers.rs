//! Renderers for results snapshots and run reports.
//!
//! - [`table`] - Pretty-print a snapshot as a table using the `tabled` crate
//! - [`json`] - Serialize snapshots and reports to JSON
//!
//! Observers only read; they take a [`ResultsSnapshot`](crate::snapshot::ResultsSnapshot)
//! or [`RunReport`](crate::snapshot::RunReport) the caller already owns and
//! never touch the orchestrator.
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust,ignore
//! use contendere::observers::Result;
//! use contendere::observers::table::TableObserver;
//!
//! fn print(orchestrator: &Orchestrator) -> Result<()> {
//!     let snapshot = orchestrator.snapshot();
//!     TableObserver::new().write_to(&snapshot, &mut std::io::stdout())
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;
