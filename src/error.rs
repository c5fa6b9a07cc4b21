//! Error type for harness runs.
//!
//! No strategy fails during a well-formed run. The variants below cover
//! invalid configuration and the programming errors that would follow from
//! a broken shutdown ordering (applying to a queue that was already closed,
//! or a consumer task dying before it could report).

use thiserror::Error;

/// Error type for all orchestrator and strategy operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The configuration cannot describe a valid run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A signal was sent to the pipeline after its queue was closed.
    #[error("pipeline queue is closed")]
    PipelineClosed,

    /// The semaphore guarding its counter was closed.
    #[error("semaphore is closed")]
    SemaphoreClosed,

    /// A request was sent to the actor after its request queue was closed.
    #[error("actor request queue is closed")]
    ActorClosed,

    /// The actor dropped a `GetValue` reply slot without answering.
    #[error("actor dropped the reply slot")]
    ActorNoReply,

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// A consumer task ended abnormally.
    #[error("consumer task failed: {0}")]
    ConsumerFailed(String),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
