//! # Contendere - Concurrent Update Strategies Under Contention
//!
//! A harness that makes a crowd of concurrent workers increment "the same"
//! counter through seven different synchronization strategies at once, and
//! then checks, per strategy, whether the final tally equals the number of
//! increments actually issued.
//!
//! ## The Problem
//!
//! Incrementing a shared counter is the smallest possible read-modify-write.
//! Done naively from many threads it silently loses updates: two workers read
//! the same value, both add one, both write back, and one increment is gone.
//! Every correct alternative pays for exactness differently: retries, parked
//! waiters, queues, or a dedicated task.
//!
//! ## The Strategies
//!
//! | Strategy | Discipline | Exact? |
//! |----------|------------|--------|
//! | [`Unguarded`](strategies::unguarded::Unguarded) | load, then store | no: loses updates |
//! | [`AtomicCas`](strategies::atomic::AtomicCas) | compare-and-swap loop | yes |
//! | [`MutexCounter`](strategies::mutex::MutexCounter) | suspending mutex | yes |
//! | [`SemaphoreCounter`](strategies::semaphore::SemaphoreCounter) | one-permit semaphore | yes |
//! | [`Pipeline`](strategies::pipeline::Pipeline) | signal queue, single consumer | yes |
//! | [`Actor`](strategies::actor::Actor) | private state, request queue | yes |
//! | [`Broadcast`](strategies::broadcast::Broadcast) | event bus, single subscriber | yes, if the buffer fits the run |
//!
//! ## The Run
//!
//! The [`Orchestrator`](orchestrator::Orchestrator) resets every counter,
//! spawns [`WORKERS`] tasks on the tokio multi-threaded runtime, and each
//! task applies one update to every strategy [`ITERATIONS`] times. After all
//! workers join, the queue-backed strategies are shut down in a fixed order
//! (pipeline drained, actor queried, broadcast subscriber cancelled) and the
//! final [`ResultsSnapshot`](snapshot::ResultsSnapshot) is published.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │           1000 workers × 100 iterations = 100 000             │
//! ├───────────────────────────────────────────────────────────────┤
//! │  unguarded   ███████████████████████████████████░░░   97 312  │
//! │  atomic      ██████████████████████████████████████  100 000  │
//! │  mutex       ██████████████████████████████████████  100 000  │
//! │  semaphore   ██████████████████████████████████████  100 000  │
//! │  pipeline    ██████████████████████████████████████  100 000  │
//! │  actor       ██████████████████████████████████████  100 000  │
//! │  broadcast   ██████████████████████████████████████  100 000  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The unguarded figure varies from run to run and host to host; everything
//! else is exact every time.
//!
//! ## Quick Start
//!
//! ```rust
//! use contendere::config::HarnessConfig;
//! use contendere::orchestrator::Orchestrator;
//! use contendere::strategies::StrategyKind;
//!
//! # #[tokio::main]
//! # async fn main() -> contendere::error::Result<()> {
//! let config = HarnessConfig::new()
//!     .with_workers(20)
//!     .with_iterations(50)
//!     .sized_for_target();
//! let orchestrator = Orchestrator::new(config)?;
//!
//! if let Some(report) = orchestrator.run().await? {
//!     assert!(report.snapshot.all_safe_exact());
//!     assert!(report.snapshot.get(StrategyKind::Unguarded).unwrap() <= 1000);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Observers
//!
//! Snapshots can be rendered by the optional observer modules:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Pretty-print results as ASCII tables |
//! | `json` | [`observers::json`] | Serialize snapshots and reports to JSON |
//! | `full` | All observers | Enables all observer modules |

pub mod config;
pub mod error;
pub mod observers;
pub mod orchestrator;
pub mod snapshot;
pub mod strategies;

pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use orchestrator::Orchestrator;
pub use snapshot::{ResultsSnapshot, RunReport, RunState, Verdict};
pub use strategies::StrategyKind;

/// Default number of concurrent workers per run.
pub const WORKERS: usize = 1000;

/// Default number of increments each worker applies to every strategy.
pub const ITERATIONS: usize = 100;

/// Default number of increments each strategy should end a run with.
pub const TARGET: u64 = (WORKERS * ITERATIONS) as u64;
