//! Counter fed by a multi-producer event bus with a single subscriber.
//!
//! Every worker publishes an [`Event`] on a [`tokio::sync::broadcast`]
//! channel; one subscriber task receives them and counts. The bus is a
//! fixed-size ring: when publishers get more than `capacity` events ahead of
//! the subscriber, the oldest unread events are overwritten. Publishers are
//! not told. The subscriber learns about the gap on its next receive and the
//! number of events it missed is tallied as `dropped`.
//!
//! Publishers never close the bus, so the subscriber has no natural end.
//! Shutdown first gives it a bounded amount of time to empty the ring
//! ([`BroadcastSubscriber::settle`]) and then cancels the task outright.
//!
//! # Capacity
//!
//! With a capacity at least equal to the number of events in a run the ring
//! can never overflow and the count is exact. Smaller capacities trade
//! memory for possible under-counting, depending on how far the subscriber
//! falls behind.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::strategies::{Observable, StrategyKind};

/// Polling interval while waiting for the subscriber to catch up.
const SETTLE_POLL: Duration = Duration::from_millis(1);

/// The unit published on the bus; carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event;

/// Long-lived broadcast state: the subscriber's count and drop tally.
#[derive(Default)]
pub struct Broadcast {
    count: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl Broadcast {
    /// Creates broadcast state with no bus open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a bus of the given capacity and spawns its subscriber.
    ///
    /// The subscription exists before this returns, so no event published
    /// through the returned publisher can be missed for lack of a receiver.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or larger than `usize::MAX / 2`, and
    /// if called outside a tokio runtime.
    pub fn open(&self, capacity: usize) -> (BroadcastPublisher, BroadcastSubscriber) {
        let (tx, rx) = broadcast::channel(capacity);
        let task = tokio::spawn(subscribe(
            rx,
            Arc::clone(&self.count),
            Arc::clone(&self.dropped),
        ));
        (
            BroadcastPublisher { tx: tx.clone() },
            BroadcastSubscriber { bus: tx, task },
        )
    }

    /// Events the subscriber missed because the ring overflowed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sets the counter and the drop tally back to zero.
    ///
    /// Only meaningful while no subscriber is running.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl Observable for Broadcast {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Broadcast
    }

    fn value(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Debug for Broadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "broadcast{{ {} dropped:{} }}", self.value(), self.dropped())
    }
}

async fn subscribe(
    mut rx: broadcast::Receiver<Event>,
    count: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
) {
    loop {
        match rx.recv().await {
            Ok(Event) => {
                count.fetch_add(1, Ordering::Relaxed);
            }
            Err(RecvError::Lagged(missed)) => {
                dropped.fetch_add(missed, Ordering::Relaxed);
                warn!(missed, "broadcast subscriber lagged, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Publisher handle given to every worker.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Event>,
}

impl BroadcastPublisher {
    /// Publishes one event. Never waits and never fails.
    ///
    /// If the ring is full the oldest unread event is overwritten; if the
    /// subscriber is already gone the event goes nowhere.
    #[inline]
    pub fn apply(&self) {
        let _ = self.tx.send(Event);
    }
}

/// Handle on the running subscriber, held by the orchestrator.
#[derive(Debug)]
pub struct BroadcastSubscriber {
    bus: broadcast::Sender<Event>,
    task: JoinHandle<()>,
}

impl BroadcastSubscriber {
    /// Events published but not yet received by the subscriber.
    pub fn backlog(&self) -> usize {
        self.bus.len()
    }

    /// Waits until the subscriber has received every retained event, or
    /// until `timeout` elapses.
    ///
    /// Returns `true` if the backlog reached zero.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let drained = async {
            while !self.bus.is_empty() {
                tokio::time::sleep(SETTLE_POLL).await;
            }
        };
        match tokio::time::timeout(timeout, drained).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    backlog = self.backlog(),
                    "broadcast subscriber did not settle before cancellation"
                );
                false
            }
        }
    }

    /// Cancels the subscriber and waits until it has stopped.
    pub async fn cancel(self) -> Result<()> {
        self.task.abort();
        match self.task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => {
                debug!("broadcast subscriber cancelled");
                Ok(())
            }
            Err(e) => Err(HarnessError::ConsumerFailed(format!(
                "broadcast subscriber: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_counts_every_event() {
        let broadcast = Broadcast::new();
        let (publisher, subscriber) = broadcast.open(1024);
        for _ in 0..500 {
            publisher.apply();
        }
        assert!(subscriber.settle(SETTLE).await);
        subscriber.cancel().await.unwrap();
        assert_eq!(broadcast.value(), 500);
        assert_eq!(broadcast.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_events() {
        let broadcast = Broadcast::new();
        let (publisher, subscriber) = broadcast.open(8);
        // current-thread runtime: the subscriber cannot run until we yield
        for _ in 0..100 {
            publisher.apply();
        }
        assert!(subscriber.settle(SETTLE).await);
        subscriber.cancel().await.unwrap();

        assert!(broadcast.value() < 100);
        assert_eq!(broadcast.value() + broadcast.dropped(), 100);
    }

    #[tokio::test]
    async fn test_cancel_without_events() {
        let broadcast = Broadcast::new();
        let (_publisher, subscriber) = broadcast.open(4);
        assert_eq!(subscriber.backlog(), 0);
        subscriber.cancel().await.unwrap();
        assert_eq!(broadcast.value(), 0);
    }

    #[tokio::test]
    async fn test_publish_after_cancel_is_silent() {
        let broadcast = Broadcast::new();
        let (publisher, subscriber) = broadcast.open(4);
        subscriber.cancel().await.unwrap();
        publisher.apply();
        assert_eq!(broadcast.value(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_lossless() {
        let broadcast = Broadcast::new();
        let (publisher, subscriber) = broadcast.open(16_000);

        let mut publishers = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let publisher = publisher.clone();
            publishers.spawn(async move {
                for _ in 0..1000 {
                    publisher.apply();
                }
            });
        }
        while let Some(joined) = publishers.join_next().await {
            joined.unwrap();
        }

        assert!(subscriber.settle(SETTLE).await);
        subscriber.cancel().await.unwrap();
        assert_eq!(broadcast.value(), 16_000);
    }

    #[tokio::test]
    async fn test_reset() {
        let broadcast = Broadcast::new();
        let (publisher, subscriber) = broadcast.open(2);
        for _ in 0..10 {
            publisher.apply();
        }
        subscriber.settle(SETTLE).await;
        subscriber.cancel().await.unwrap();
        broadcast.reset();
        assert_eq!(broadcast.value(), 0);
        assert_eq!(broadcast.dropped(), 0);
    }
}
