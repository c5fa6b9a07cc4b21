//! The seven counter update strategies and their shared infrastructure.
//!
//! Every strategy owns exactly one counter and offers one way to bump it by
//! one. What differs is the synchronization discipline guarding the counter:
//!
//! ```text
//!   worker ──apply()──►  Unguarded   load ; store           (races, loses updates)
//!          ──apply()──►  AtomicCas   CAS loop               (lock-free, exact)
//!          ──apply()──►  MutexCounter lock ; +1 ; unlock    (suspending lock)
//!          ──apply()──►  SemaphoreCounter acquire ; +1      (one-permit pool)
//!          ──apply()──►  Pipeline ═══signal═══► consumer task ; +1
//!          ──apply()──►  Actor    ═══Increment═► actor loop ; +1
//!          ──apply()──►  Broadcast ══event════► subscriber task ; +1
//! ```
//!
//! The first four are mutated in place by the calling worker. The last three
//! are mutated only by a single dedicated task, so their `apply()` merely
//! enqueues. Those tasks live for one run: the orchestrator opens them at
//! run start and shuts them down, in a fixed order, after the workers join.
//!
//! All counters are readable at any time through [`Observable`], which is
//! what the progress view uses to build a
//! [`ResultsSnapshot`](crate::snapshot::ResultsSnapshot).

pub mod actor;
pub mod atomic;
pub mod broadcast;
pub mod mutex;
pub mod pipeline;
pub mod semaphore;
pub mod unguarded;

mod queue;

use std::fmt::{self, Debug, Display};

use actor::Actor;
use atomic::AtomicCas;
use broadcast::Broadcast;
use mutex::MutexCounter;
use pipeline::Pipeline;
use semaphore::SemaphoreCounter;
use unguarded::Unguarded;

/// Identifies one of the seven strategies.
///
/// The declaration order is the order in which a worker applies its
/// updates and the order in which snapshots list the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StrategyKind {
    /// Plain read-modify-write without synchronization.
    Unguarded,
    /// Lock-free compare-and-swap increment.
    Atomic,
    /// Increment under a suspending mutex.
    Mutex,
    /// Increment under a one-permit semaphore.
    Semaphore,
    /// Signal queue drained by a single consumer.
    Pipeline,
    /// Private state behind a request queue.
    Actor,
    /// Event bus with a single subscriber.
    Broadcast,
}

impl StrategyKind {
    /// All strategies, in application order.
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::Unguarded,
        StrategyKind::Atomic,
        StrategyKind::Mutex,
        StrategyKind::Semaphore,
        StrategyKind::Pipeline,
        StrategyKind::Actor,
        StrategyKind::Broadcast,
    ];

    /// Short lowercase name used in tables, logs and JSON.
    pub const fn name(&self) -> &'static str {
        match self {
            StrategyKind::Unguarded => "unguarded",
            StrategyKind::Atomic => "atomic",
            StrategyKind::Mutex => "mutex",
            StrategyKind::Semaphore => "semaphore",
            StrategyKind::Pipeline => "pipeline",
            StrategyKind::Actor => "actor",
            StrategyKind::Broadcast => "broadcast",
        }
    }

    /// Whether the strategy is expected to hit the target exactly.
    ///
    /// Broadcast counts as safe: it only falls short when its buffer is
    /// smaller than the run, which is a configuration choice.
    pub const fn is_safe(&self) -> bool {
        !matches!(self, StrategyKind::Unguarded)
    }

    /// Position of the strategy in [`ALL`](Self::ALL).
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A counter that can be read at any time without disturbing writers.
///
/// Reads taken while a run is in flight are approximate; once the run has
/// completed they are exact.
pub trait Observable: Debug + Send + Sync {
    /// The strategy this counter belongs to.
    fn kind(&self) -> StrategyKind;

    /// Current counter value.
    fn value(&self) -> u64;

    /// Name of the strategy.
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl Display for dyn Observable + '_ {
    /// Formats the counter as `name:value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name(), self.value())
    }
}

/// The state of all seven strategies, owned by the orchestrator.
#[derive(Debug, Default)]
pub struct Strategies {
    pub unguarded: Unguarded,
    pub atomic: AtomicCas,
    pub mutex: MutexCounter,
    pub semaphore: SemaphoreCounter,
    pub pipeline: Pipeline,
    pub actor: Actor,
    pub broadcast: Broadcast,
}

impl Strategies {
    /// Creates all strategies with their counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every counter to zero.
    ///
    /// Must not overlap a run: the orchestrator only calls it after winning
    /// the run-state guard, when no worker or consumer task is alive.
    pub async fn reset(&self) {
        self.unguarded.reset();
        self.atomic.reset();
        self.mutex.reset().await;
        self.semaphore.reset().await;
        self.pipeline.reset();
        self.actor.reset();
        self.broadcast.reset();
    }

    /// All counters in application order.
    pub fn observables(&self) -> [&dyn Observable; 7] {
        [
            &self.unguarded,
            &self.atomic,
            &self.mutex,
            &self.semaphore,
            &self.pipeline,
            &self.actor,
            &self.broadcast,
        ]
    }

    /// Current value of a single strategy's counter.
    pub fn value(&self, kind: StrategyKind) -> u64 {
        self.observables()[kind.index()].value()
    }
}
