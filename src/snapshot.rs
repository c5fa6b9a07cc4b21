//! Point-in-time views of the harness.
//!
//! A [`ResultsSnapshot`] is an owned copy of all seven counters plus the run
//! state. Taking one never blocks workers. While a run is in flight the
//! seven values are read one after another and are not mutually
//! consistent; once the run state is [`RunState::Completed`] they are the
//! exact final tallies.
//!
//! A [`RunReport`] is what a completed run publishes: the final snapshot
//! plus shutdown details and timing.
//!
//! With the `serde` feature both types are serializable:
//!
//! ```rust,ignore
//! let json = serde_json::to_string(&orchestrator.snapshot())?;
//! // {"state":"completed","target":100000,"counts":[{"kind":"unguarded","count":97312},...]}
//! ```

use std::fmt::{self, Display};
use std::time::Duration;

use crate::strategies::StrategyKind;

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunState {
    /// No run has been started yet, or the last one failed.
    #[default]
    Idle,
    /// A run is in flight; new runs are rejected.
    Running,
    /// The last run finished and its counts are final.
    Completed,
}

impl RunState {
    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunState::Running,
            2 => RunState::Completed,
            _ => RunState::Idle,
        }
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
        })
    }
}

/// How a count compares with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Verdict {
    /// The count equals the target.
    Exact,
    /// The count is short of the target by this many increments.
    Lost(u64),
    /// The count exceeds the target by this many increments.
    Over(u64),
}

impl Verdict {
    /// Compares a count with a target.
    pub fn of(count: u64, target: u64) -> Self {
        match count.cmp(&target) {
            std::cmp::Ordering::Equal => Verdict::Exact,
            std::cmp::Ordering::Less => Verdict::Lost(target - count),
            std::cmp::Ordering::Greater => Verdict::Over(count - target),
        }
    }

    /// Whether the count matched exactly.
    pub fn is_exact(&self) -> bool {
        matches!(self, Verdict::Exact)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Exact => write!(f, "exact"),
            Verdict::Lost(n) => write!(f, "lost {n}"),
            Verdict::Over(n) => write!(f, "over {n}"),
        }
    }
}

/// One strategy's counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrategyCount {
    /// The strategy.
    pub kind: StrategyKind,
    /// Its counter value when the snapshot was taken.
    pub count: u64,
}

/// All seven counters and the run state at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultsSnapshot {
    /// Run state when the snapshot was taken.
    pub state: RunState,
    /// Workers × iterations for the configured workload.
    pub target: u64,
    /// Counter values in application order.
    pub counts: Vec<StrategyCount>,
}

impl ResultsSnapshot {
    /// Creates a snapshot from raw parts.
    pub fn new(state: RunState, target: u64, counts: Vec<StrategyCount>) -> Self {
        Self {
            state,
            target,
            counts,
        }
    }

    /// Counter value for a strategy.
    pub fn get(&self, kind: StrategyKind) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.count)
    }

    /// How a strategy's count compares with the target.
    pub fn verdict(&self, kind: StrategyKind) -> Option<Verdict> {
        self.get(kind).map(|count| Verdict::of(count, self.target))
    }

    /// Whether a run was in flight when the snapshot was taken.
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Whether every safe strategy hit the target exactly.
    ///
    /// Always `false` unless the snapshot was taken after completion.
    pub fn all_safe_exact(&self) -> bool {
        self.state == RunState::Completed
            && self
                .counts
                .iter()
                .filter(|c| c.kind.is_safe())
                .all(|c| c.count == self.target)
    }

    /// Iterates over counts together with their verdicts.
    pub fn iter(&self) -> impl Iterator<Item = (StrategyKind, u64, Verdict)> + '_ {
        self.counts
            .iter()
            .map(|c| (c.kind, c.count, Verdict::of(c.count, self.target)))
    }
}

/// What a completed run publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    /// Sequence number of the run, starting at 1.
    pub run: u64,
    /// Final counters, taken after every consumer was shut down.
    pub snapshot: ResultsSnapshot,
    /// Count reported by the pipeline consumer after draining.
    pub pipeline_drained: u64,
    /// Reply to the actor's final `GetValue`.
    pub actor_reply: u64,
    /// Broadcast events lost to ring overflow.
    pub broadcast_dropped: u64,
    /// Failed compare-and-swap attempts on the atomic counter.
    pub cas_retries: u64,
    /// Wall-clock duration of the run; informational only.
    #[cfg_attr(feature = "serde", serde(with = "crate::config::duration_ms", rename = "elapsed_ms"))]
    pub elapsed: Duration,
}
