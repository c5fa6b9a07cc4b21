//! Run lifecycle: reset, fan out, join, drain, publish.
//!
//! One run of the harness goes through these phases:
//!
//! ```text
//!  try_begin ─► reset ─► open consumers ─► spawn W workers ─► join all
//!   (CAS on                 pipeline,        each: I × 7 updates    │
//!   RunState)               actor,                                  ▼
//!                           broadcast     (a) pipeline: close, then drain
//!                                         (b) actor: GetValue, then close
//!                                         (c) broadcast: settle, then cancel
//!                                                                   │
//!                                     Completed ◄─ publish report ◄─┘
//! ```
//!
//! The shutdown steps run strictly in that order and only after the last
//! worker has joined, so no update can arrive at a consumer that is already
//! gone. The run state is guarded by a compare-and-swap: a second run
//! requested while one is in flight is turned away without touching any
//! counter. Winning the guard yields a `RunGuard` that hands the slot back
//! as Idle if the run is dropped before it completes.
//!
//! # Examples
//!
//! ```rust
//! use contendere::config::HarnessConfig;
//! use contendere::orchestrator::Orchestrator;
//! use contendere::strategies::StrategyKind;
//!
//! # #[tokio::main]
//! # async fn main() -> contendere::error::Result<()> {
//! let config = HarnessConfig::new().with_workers(10).with_iterations(10);
//! let orchestrator = Orchestrator::new(config)?;
//!
//! let report = orchestrator.run().await?.expect("no other run in flight");
//! assert_eq!(report.snapshot.get(StrategyKind::Actor), Some(100));
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::snapshot::{ResultsSnapshot, RunReport, RunState, StrategyCount};
use crate::strategies::actor::ActorRef;
use crate::strategies::broadcast::BroadcastPublisher;
use crate::strategies::pipeline::PipelineSender;
use crate::strategies::{Strategies, StrategyKind};

/// Everything a worker needs to reach the seven strategies during one run.
struct RunHandles {
    strategies: Arc<Strategies>,
    pipeline: PipelineSender,
    actor: ActorRef,
    broadcast: BroadcastPublisher,
}

/// One member of the worker population.
struct Worker {
    id: usize,
    iterations: usize,
    handles: Arc<RunHandles>,
}

impl Worker {
    /// Applies one update to every strategy, `iterations` times.
    async fn run(self) -> Result<()> {
        let s = &self.handles.strategies;
        for _ in 0..self.iterations {
            s.unguarded.apply();
            s.atomic.apply();
            s.mutex.apply().await;
            s.semaphore.apply().await?;
            self.handles.pipeline.apply()?;
            self.handles.actor.apply()?;
            self.handles.broadcast.apply();
        }
        trace!(worker = self.id, "worker done");
        Ok(())
    }
}

/// The run slot won by `try_begin`, held until the run concludes.
///
/// Dropped without [`complete`](Self::complete), for example because the
/// `run()` future was cancelled or the background task aborted, it resets
/// the state to Idle so later runs are accepted again.
struct RunGuard {
    state: Arc<AtomicU8>,
    completed: bool,
}

impl RunGuard {
    fn complete(mut self) {
        self.state
            .store(RunState::Completed.as_u8(), Ordering::Release);
        self.completed = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.state.store(RunState::Idle.as_u8(), Ordering::Release);
            debug!("run slot released before completion");
        }
    }
}

/// Drives benchmark runs and serves progress snapshots.
///
/// Share it behind an [`Arc`] to start runs in the background with
/// [`start_run`](Self::start_run) while other tasks poll
/// [`snapshot`](Self::snapshot).
pub struct Orchestrator {
    config: HarnessConfig,
    strategies: Arc<Strategies>,
    state: Arc<AtomicU8>,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    reports: watch::Sender<Option<RunReport>>,
}

impl Orchestrator {
    /// Creates an idle orchestrator for a validated configuration.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let (reports, _) = watch::channel(None);
        Ok(Self {
            config,
            strategies: Arc::new(Strategies::new()),
            state: Arc::new(AtomicU8::new(RunState::Idle.as_u8())),
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            reports,
        })
    }

    /// The configuration runs are executed with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Workers × iterations.
    pub fn target(&self) -> u64 {
        self.config.target()
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of runs that reached [`RunState::Completed`].
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    /// Reads all seven counters and the run state.
    ///
    /// Never blocks and may be called from any thread at any time.
    pub fn snapshot(&self) -> ResultsSnapshot {
        ResultsSnapshot::new(self.state(), self.target(), self.counts())
    }

    fn counts(&self) -> Vec<StrategyCount> {
        self.strategies
            .observables()
            .iter()
            .map(|o| StrategyCount {
                kind: o.kind(),
                count: o.value(),
            })
            .collect()
    }

    /// Report of the most recent completed run, if any.
    pub fn last_report(&self) -> Option<RunReport> {
        self.reports.borrow().clone()
    }

    /// Subscribes to completed-run reports.
    ///
    /// The receiver is marked changed each time a run completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<RunReport>> {
        self.reports.subscribe()
    }

    /// Runs one full cycle and waits for it to finish.
    ///
    /// Returns `Ok(None)` without doing anything if a run is already in
    /// flight.
    pub async fn run(&self) -> Result<Option<RunReport>> {
        let Some(guard) = self.try_begin() else {
            return Ok(None);
        };
        let outcome = self.execute().await;
        self.conclude(guard, outcome).map(Some)
    }

    /// Starts one full cycle in the background.
    ///
    /// Returns `None` if a run is already in flight; otherwise the handle
    /// resolves to the run's report. The state switches to
    /// [`RunState::Running`] before this returns.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_run(self: &Arc<Self>) -> Option<JoinHandle<Result<RunReport>>> {
        let guard = self.try_begin()?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let outcome = this.execute().await;
            this.conclude(guard, outcome)
        }))
    }

    /// Moves Idle or Completed to Running; fails if already Running.
    fn try_begin(&self) -> Option<RunGuard> {
        let running = RunState::Running.as_u8();
        let won = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != running).then_some(running)
            })
            .is_ok();
        if !won {
            debug!("run already in progress, start request ignored");
            return None;
        }
        Some(RunGuard {
            state: Arc::clone(&self.state),
            completed: false,
        })
    }

    /// Publishes the outcome, then releases the run slot.
    ///
    /// The report is in place before the state reads Completed, so a
    /// poller that sees Completed also sees this run's report.
    fn conclude(&self, guard: RunGuard, outcome: Result<RunReport>) -> Result<RunReport> {
        match outcome {
            Ok(report) => {
                self.runs_completed.fetch_add(1, Ordering::Relaxed);
                self.reports.send_replace(Some(report.clone()));
                guard.complete();
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "run failed");
                drop(guard);
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<RunReport> {
        let started = Instant::now();
        let run = self.runs_started.fetch_add(1, Ordering::Relaxed) + 1;
        let config = &self.config;

        self.strategies.reset().await;
        info!(
            run,
            workers = config.workers,
            iterations = config.iterations,
            target = config.target(),
            broadcast_capacity = config.broadcast_capacity,
            "run started"
        );
        if !config.broadcast_is_lossless() {
            warn!(
                run,
                capacity = config.broadcast_capacity,
                target = config.target(),
                "broadcast buffer smaller than the run, events may be dropped"
            );
        }

        let (pipeline, pipeline_consumer) = self.strategies.pipeline.open();
        let actor = self.strategies.actor.spawn();
        let (broadcast, broadcast_subscriber) =
            self.strategies.broadcast.open(config.broadcast_capacity);

        let handles = Arc::new(RunHandles {
            strategies: Arc::clone(&self.strategies),
            pipeline,
            actor: actor.actor_ref(),
            broadcast,
        });

        let mut workers = JoinSet::new();
        for id in 0..config.workers {
            let worker = Worker {
                id,
                iterations: config.iterations,
                handles: Arc::clone(&handles),
            };
            workers.spawn(worker.run());
        }
        drop(handles);

        // join barrier; keep the first failure but let every worker finish
        let mut outcome = Ok(());
        while let Some(joined) = workers.join_next().await {
            let result = joined.map_err(HarnessError::from).and_then(|r| r);
            if let Err(e) = result {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        debug!(run, "workers joined");

        // (a) pipeline: close first, then wait for the backlog
        let pipeline_drained = pipeline_consumer.close_and_drain().await;

        // (b) actor: the reply covers every earlier Increment
        let actor_reply = actor.get_value().await;
        let actor_stopped = actor.stop().await;

        // (c) broadcast: no natural end, give it time to catch up then cancel
        broadcast_subscriber.settle(config.settle_timeout).await;
        let broadcast_cancelled = broadcast_subscriber.cancel().await;

        outcome?;
        let pipeline_drained = pipeline_drained?;
        let actor_reply = actor_reply?;
        actor_stopped?;
        broadcast_cancelled?;

        // the slot stays Running until conclude, so no other run can reset
        // the counters underneath this read
        let snapshot =
            ResultsSnapshot::new(RunState::Completed, self.target(), self.counts());
        let report = RunReport {
            run,
            pipeline_drained,
            actor_reply,
            broadcast_dropped: self.strategies.broadcast.dropped(),
            cas_retries: self.strategies.atomic.retries(),
            elapsed: started.elapsed(),
            snapshot,
        };

        info!(
            run,
            elapsed_ms = report.elapsed.as_millis() as u64,
            all_safe_exact = report.snapshot.all_safe_exact(),
            "run completed"
        );
        for (kind, count, verdict) in report.snapshot.iter() {
            if kind.is_safe() && !verdict.is_exact() {
                warn!(run, strategy = %kind, count, %verdict, "safe strategy missed target");
            } else {
                debug!(run, strategy = %kind, count, %verdict, "strategy result");
            }
        }
        if report.broadcast_dropped > 0 {
            warn!(
                run,
                dropped = report.broadcast_dropped,
                capacity = config.broadcast_capacity,
                "broadcast buffer overflowed"
            );
        }

        Ok(report)
    }

    /// Current value of one strategy's counter.
    pub fn count(&self, kind: StrategyKind) -> u64 {
        self.strategies.value(kind)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("strategies", &self.strategies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Verdict;
    use crate::{ITERATIONS, TARGET, WORKERS};
    use std::time::Duration;

    fn small() -> HarnessConfig {
        HarnessConfig::new()
            .with_workers(50)
            .with_iterations(40)
            .sized_for_target()
    }

    fn assert_safe_exact(report: &RunReport) {
        let target = report.snapshot.target;
        for kind in StrategyKind::ALL.iter().filter(|k| k.is_safe()) {
            assert_eq!(
                report.snapshot.get(*kind),
                Some(target),
                "{kind} missed target"
            );
        }
        let unguarded = report.snapshot.get(StrategyKind::Unguarded).unwrap();
        assert!(unguarded <= target);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = HarnessConfig::new().with_broadcast_capacity(0);
        assert!(matches!(
            Orchestrator::new(config),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_idle_snapshot() {
        let orchestrator = Orchestrator::new(small()).unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.state, RunState::Idle);
        assert_eq!(snapshot.target, 2000);
        assert_eq!(snapshot.counts.len(), 7);
        assert!(snapshot.counts.iter().all(|c| c.count == 0));
        assert!(orchestrator.last_report().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_run_hits_target() {
        let orchestrator = Orchestrator::new(small()).unwrap();
        let report = orchestrator.run().await.unwrap().unwrap();

        assert_eq!(report.run, 1);
        assert_eq!(report.snapshot.state, RunState::Completed);
        assert_safe_exact(&report);
        assert!(report.snapshot.all_safe_exact());
        assert_eq!(orchestrator.state(), RunState::Completed);
        assert_eq!(orchestrator.runs_completed(), 1);
        assert_eq!(orchestrator.last_report(), Some(report));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reference_workload() {
        let orchestrator = Orchestrator::new(HarnessConfig::default()).unwrap();
        assert_eq!(orchestrator.target(), (WORKERS * ITERATIONS) as u64);

        let report = orchestrator.run().await.unwrap().unwrap();
        let snapshot = &report.snapshot;
        for kind in [
            StrategyKind::Atomic,
            StrategyKind::Mutex,
            StrategyKind::Semaphore,
            StrategyKind::Pipeline,
            StrategyKind::Actor,
            StrategyKind::Broadcast,
        ] {
            assert_eq!(snapshot.get(kind), Some(TARGET), "{kind}");
        }
        assert!(snapshot.get(StrategyKind::Unguarded).unwrap() <= TARGET);
        assert_eq!(report.broadcast_dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_drains_pipeline_and_actor() {
        let orchestrator = Orchestrator::new(small()).unwrap();
        let report = orchestrator.run().await.unwrap().unwrap();
        let target = orchestrator.target();

        assert_eq!(report.pipeline_drained, target);
        assert_eq!(report.actor_reply, target);
        assert_eq!(orchestrator.count(StrategyKind::Pipeline), target);
        assert_eq!(orchestrator.count(StrategyKind::Actor), target);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_runs_reset_and_repeat() {
        let orchestrator = Orchestrator::new(small()).unwrap();
        for expected_run in 1..=3 {
            let report = orchestrator.run().await.unwrap().unwrap();
            assert_eq!(report.run, expected_run);
            // counts do not accumulate across runs
            assert_safe_exact(&report);
        }
        assert_eq!(orchestrator.runs_completed(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_second_start_while_running_is_ignored() {
        // the reference workload keeps the first run busy long enough
        let orchestrator = Arc::new(Orchestrator::new(HarnessConfig::default()).unwrap());

        let first = orchestrator.start_run().expect("first run accepted");
        assert_eq!(orchestrator.state(), RunState::Running);
        assert!(orchestrator.start_run().is_none());
        assert!(orchestrator.run().await.unwrap().is_none());

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.run, 1);
        assert_safe_exact(&report);
        assert_eq!(orchestrator.runs_completed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_requests_never_overlap() {
        let orchestrator = Arc::new(Orchestrator::new(small()).unwrap());

        let mut requests = JoinSet::new();
        for _ in 0..8 {
            let orchestrator = Arc::clone(&orchestrator);
            requests.spawn(async move { orchestrator.run().await });
        }

        let mut completed = Vec::new();
        while let Some(joined) = requests.join_next().await {
            if let Some(report) = joined.unwrap().unwrap() {
                completed.push(report);
            }
        }

        // rejected requests never corrupt the admitted runs
        assert!(!completed.is_empty());
        for report in &completed {
            assert_safe_exact(report);
        }
        assert_eq!(orchestrator.runs_completed(), completed.len() as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_restart_after_completion() {
        let orchestrator = Arc::new(Orchestrator::new(small()).unwrap());
        orchestrator.start_run().unwrap().await.unwrap().unwrap();
        assert_eq!(orchestrator.state(), RunState::Completed);

        let handle = orchestrator.start_run().expect("restart accepted");
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.run, 2);
        assert_safe_exact(&report);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_sees_completed_report() {
        let orchestrator = Arc::new(Orchestrator::new(small()).unwrap());
        let mut reports = orchestrator.subscribe();

        let handle = orchestrator.start_run().unwrap();
        reports.changed().await.unwrap();
        let published = reports.borrow_and_update().clone().unwrap();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(published, report);
        assert_eq!(published.snapshot.state, RunState::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_snapshot_during_run_is_bounded() {
        let orchestrator = Arc::new(Orchestrator::new(small()).unwrap());
        let handle = orchestrator.start_run().unwrap();

        while !handle.is_finished() {
            let snapshot = orchestrator.snapshot();
            for count in &snapshot.counts {
                assert!(count.count <= snapshot.target);
            }
            tokio::task::yield_now().await;
        }
        handle.await.unwrap().unwrap();
        assert!(orchestrator.snapshot().all_safe_exact());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_small_broadcast_buffer_accepts_undercount() {
        let config = HarnessConfig::new()
            .with_workers(100)
            .with_iterations(100)
            .with_broadcast_capacity(1);
        let orchestrator = Orchestrator::new(config).unwrap();
        let report = orchestrator.run().await.unwrap().unwrap();
        let snapshot = &report.snapshot;

        let broadcast = snapshot.get(StrategyKind::Broadcast).unwrap();
        assert!(broadcast <= snapshot.target);
        assert_eq!(broadcast + report.broadcast_dropped, snapshot.target);
        // every other safe strategy is unaffected
        for kind in [
            StrategyKind::Atomic,
            StrategyKind::Mutex,
            StrategyKind::Semaphore,
            StrategyKind::Pipeline,
            StrategyKind::Actor,
        ] {
            assert_eq!(snapshot.verdict(kind), Some(Verdict::Exact), "{kind}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_run_releases_slot() {
        let orchestrator = Orchestrator::new(HarnessConfig::default()).unwrap();

        let first = tokio::time::timeout(Duration::from_millis(5), orchestrator.run()).await;
        assert!(first.is_err(), "reference workload finished within 5 ms");
        assert_ne!(orchestrator.state(), RunState::Running);
        assert_eq!(orchestrator.runs_completed(), 0);

        // let the aborted workers and detached consumers wind down
        tokio::time::sleep(Duration::from_millis(200)).await;

        let report = orchestrator.run().await.unwrap().expect("slot was released");
        assert_eq!(report.run, 2);
        assert_eq!(orchestrator.state(), RunState::Completed);
        assert_eq!(orchestrator.runs_completed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_aborted_background_run_releases_slot() {
        let orchestrator = Arc::new(Orchestrator::new(HarnessConfig::default()).unwrap());

        let handle = orchestrator.start_run().unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(orchestrator.state(), RunState::Idle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(orchestrator.start_run().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_runs_publish_final_reports() {
        let orchestrator = Arc::new(Orchestrator::new(small()).unwrap());

        let mut callers = JoinSet::new();
        for _ in 0..4 {
            let orchestrator = Arc::clone(&orchestrator);
            callers.spawn(async move {
                let mut reports = Vec::new();
                for _ in 0..10 {
                    if let Some(report) = orchestrator.run().await? {
                        reports.push(report);
                    }
                    // Completed always comes with that run's report in place
                    if orchestrator.state() == RunState::Completed {
                        assert!(orchestrator.last_report().is_some());
                    }
                }
                Ok::<_, HarnessError>(reports)
            });
        }

        let mut completed: u64 = 0;
        while let Some(joined) = callers.join_next().await {
            for report in joined.unwrap().unwrap() {
                // a run started right after this one must not leak into it
                assert_eq!(report.snapshot.state, RunState::Completed);
                assert_safe_exact(&report);
                completed += 1;
            }
        }
        assert!(completed > 0);
        assert_eq!(orchestrator.runs_completed(), completed);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_undersized_broadcast_warns_before_run() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        // current-thread runtime: every task logs through this dispatcher
        let _default = tracing::subscriber::set_default(subscriber);

        let config = HarnessConfig::new()
            .with_workers(4)
            .with_iterations(4)
            .with_broadcast_capacity(2);
        let orchestrator = Orchestrator::new(config).unwrap();
        orchestrator.run().await.unwrap().unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let warned = logs
            .find("broadcast buffer smaller than the run")
            .expect("no capacity warning");
        // announced up front, not only once events were already lost
        let first_drop = ["lagged", "overflowed"]
            .iter()
            .filter_map(|needle| logs.find(needle))
            .min()
            .unwrap_or(usize::MAX);
        assert!(warned < first_drop);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_workers() {
        let config = HarnessConfig::new().with_workers(0).sized_for_target();
        let orchestrator = Orchestrator::new(config).unwrap();
        let report = orchestrator.run().await.unwrap().unwrap();
        assert_eq!(report.snapshot.target, 0);
        assert!(report.snapshot.all_safe_exact());
    }
}
