//! Counter held privately by an actor task.
//!
//! The count lives in a local variable of the actor's processing loop and
//! nothing outside that loop can change it. The rest of the world talks to
//! the actor through [`ActorRef`], which enqueues [`Request`]s:
//!
//! - [`Request::Increment`] is fire-and-forget;
//! - [`Request::GetValue`] carries a oneshot reply slot that the actor fills
//!   before it looks at the next request.
//!
//! Requests are handled strictly in send order, so a `GetValue` reply
//! reflects every `Increment` sent before it. After each request the actor
//! also publishes its count to a relaxed atomic for progress readers; that
//! view is written by the actor only.
//!
//! The actor never stops on its own. [`ActorHandle::stop`] closes the
//! request queue, lets the actor finish what is already queued, and waits
//! for the task to end.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::strategies::queue::{CloseableQueue, Closer};
use crate::strategies::{Observable, StrategyKind};

/// Messages understood by the actor.
#[derive(Debug)]
pub enum Request {
    /// Add one to the count.
    Increment,
    /// Reply with the current count.
    GetValue(oneshot::Sender<u64>),
}

/// Long-lived actor state: the published view of the actor's count.
#[derive(Default)]
pub struct Actor {
    published: Arc<AtomicU64>,
}

impl Actor {
    /// Creates an actor state with no task running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a new actor task starting from a count of zero.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self) -> ActorHandle {
        let (tx, closer, queue) = CloseableQueue::new();
        let published = Arc::clone(&self.published);
        published.store(0, Ordering::Relaxed);
        let task = tokio::spawn(run(queue, published));
        ActorHandle {
            actor_ref: ActorRef { tx },
            closer,
            task,
        }
    }

    /// Clears the published count.
    ///
    /// Only meaningful while no actor task is running.
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
    }
}

impl Observable for Actor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Actor
    }

    fn value(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor{{ {} }}", self.value())
    }
}

async fn run(mut queue: CloseableQueue<Request>, published: Arc<AtomicU64>) -> u64 {
    let mut count: u64 = 0;
    while let Some(request) = queue.recv().await {
        match request {
            Request::Increment => {
                count += 1;
                published.store(count, Ordering::Relaxed);
            }
            Request::GetValue(reply) => {
                // the asker may have given up waiting
                let _ = reply.send(count);
            }
        }
    }
    count
}

/// Address of a running actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ActorRef {
    tx: mpsc::UnboundedSender<Request>,
}

impl ActorRef {
    /// Sends an `Increment`. Never waits.
    #[inline]
    pub fn apply(&self) -> Result<()> {
        self.send(Request::Increment)
    }

    /// Asks the actor for its count and waits for the reply.
    pub async fn get_value(&self) -> Result<u64> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Request::GetValue(reply_tx))?;
        reply_rx.await.map_err(|_| HarnessError::ActorNoReply)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.tx.send(request).map_err(|_| HarnessError::ActorClosed)
    }
}

/// Owner handle of a running actor, held by the orchestrator.
#[derive(Debug)]
pub struct ActorHandle {
    actor_ref: ActorRef,
    closer: Closer,
    task: JoinHandle<u64>,
}

impl ActorHandle {
    /// Returns a new address for the actor.
    pub fn actor_ref(&self) -> ActorRef {
        self.actor_ref.clone()
    }

    /// Asks the actor for its count and waits for the reply.
    pub async fn get_value(&self) -> Result<u64> {
        self.actor_ref.get_value().await
    }

    /// Closes the request queue and waits for the actor to finish.
    ///
    /// Requests already queued are still processed. Returns the count the
    /// actor ended with.
    pub async fn stop(self) -> Result<u64> {
        self.closer.close();
        let count = self
            .task
            .await
            .map_err(|e| HarnessError::ConsumerFailed(format!("actor: {e}")))?;
        debug!(count, "actor stopped");
        Ok(count)
    }
}
