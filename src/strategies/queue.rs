//! Unbounded FIFO queue that its owner can close from the outside.
//!
//! The pipeline consumer and the actor both drain an unbounded mpsc queue.
//! Shutting either down must not depend on every sender clone having been
//! dropped, and must not lose anything already enqueued. A [`Closer`]
//! gives the orchestrator that handle: once fired, the receiving side
//! refuses new items but keeps yielding the buffered ones, and `recv`
//! returns `None` only after the buffer is empty.

use tokio::sync::{mpsc, oneshot};

/// Fires the close signal of a [`CloseableQueue`].
///
/// Dropping the closer closes the queue as well.
#[derive(Debug)]
pub(crate) struct Closer(oneshot::Sender<()>);

impl Closer {
    pub(crate) fn close(self) {
        // the receiver may already be gone if its task ended early
        let _ = self.0.send(());
    }
}

/// Receiving half with an external close signal.
#[derive(Debug)]
pub(crate) struct CloseableQueue<T> {
    rx: mpsc::UnboundedReceiver<T>,
    close_rx: Option<oneshot::Receiver<()>>,
}

impl<T> CloseableQueue<T> {
    /// Creates a queue and returns its sender, closer and receiving half.
    pub(crate) fn new() -> (mpsc::UnboundedSender<T>, Closer, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let queue = Self {
            rx,
            close_rx: Some(close_rx),
        };
        (tx, Closer(close_tx), queue)
    }

    /// Receives the next item in send order.
    ///
    /// Returns `None` once the queue has been closed (by the closer or by
    /// every sender going away) and all buffered items have been yielded.
    pub(crate) async fn recv(&mut self) -> Option<T> {
        let closing = match self.close_rx.as_mut() {
            None => return self.rx.recv().await,
            Some(close_rx) => tokio::select! {
                biased;
                _ = close_rx => true,
                item = self.rx.recv() => return item,
            },
        };
        if closing {
            self.rx.close();
            self.close_rx = None;
        }
        self.rx.recv().await
    }
}
