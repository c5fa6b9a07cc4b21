//! Counter owned by a single consumer draining a signal queue.
//!
//! Workers never touch the counter. [`PipelineSender::apply`] pushes a
//! [`Signal`] onto an unbounded FIFO queue and returns; one consumer task pulls
//! signals off one at a time and bumps the counter for each. The count is
//! therefore exactly the number of signals fully dequeued.
//!
//! Shutdown is cooperative and ordered:
//!
//! ```text
//!   workers joined ──► close queue ──► consumer drains backlog ──► task ends
//!                         │                                           │
//!                  new sends refused                        final count returned
//! ```
//!
//! Closing before waiting is what makes the final count stable: once the
//! queue refuses new signals, whatever the consumer reports after draining
//! can no longer change.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::strategies::queue::{CloseableQueue, Closer};
use crate::strategies::{Observable, StrategyKind};

/// The unit pushed through the pipeline; carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal;

/// Long-lived pipeline state: the counter the consumer writes.
#[derive(Default)]
pub struct Pipeline {
    count: Arc<AtomicU64>,
}

impl Pipeline {
    /// Creates a pipeline with its counter at zero and no consumer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh queue and spawns its consumer.
    ///
    /// The consumer counts on top of the current value, so the orchestrator
    /// resets the pipeline before opening it for a new run.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self) -> (PipelineSender, PipelineConsumer) {
        let (tx, closer, queue) = CloseableQueue::new();
        let count = Arc::clone(&self.count);
        let task = tokio::spawn(consume(queue, count));
        (PipelineSender { tx }, PipelineConsumer { closer, task })
    }

    /// Sets the counter back to zero.
    ///
    /// Only meaningful while no consumer is running.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Observable for Pipeline {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pipeline
    }

    fn value(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline{{ {} }}", self.value())
    }
}

async fn consume(mut queue: CloseableQueue<Signal>, count: Arc<AtomicU64>) -> u64 {
    let mut drained = count.load(Ordering::Relaxed);
    while let Some(Signal) = queue.recv().await {
        drained += 1;
        count.store(drained, Ordering::Relaxed);
    }
    drained
}

/// Producer handle given to every worker.
#[derive(Debug, Clone)]
pub struct PipelineSender {
    tx: mpsc::UnboundedSender<Signal>,
}

impl PipelineSender {
    /// Enqueues one signal. Never waits.
    ///
    /// Returns [`HarnessError::PipelineClosed`] if the queue has already
    /// been closed, which means shutdown started before the workers were
    /// done.
    #[inline]
    pub fn apply(&self) -> Result<()> {
        self.tx
            .send(Signal)
            .map_err(|_| HarnessError::PipelineClosed)
    }
}

/// Handle on the running consumer, held by the orchestrator.
#[derive(Debug)]
pub struct PipelineConsumer {
    closer: Closer,
    task: JoinHandle<u64>,
}

impl PipelineConsumer {
    /// Closes the queue, then waits for the consumer to drain it.
    ///
    /// Returns the final count.
    pub async fn close_and_drain(self) -> Result<u64> {
        self.closer.close();
        let drained = self
            .task
            .await
            .map_err(|e| HarnessError::ConsumerFailed(format!("pipeline consumer: {e}")))?;
        debug!(drained, "pipeline consumer drained");
        Ok(drained)
    }
}
