//! Error types for the store interfaces

use thiserror::Error;

/// Errors surfaced by the document, counter and cache stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The round trip happened but the operation failed.
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by the durable queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue no longer accepts work; raised during shutdown draining.
    #[error("queue is closed")]
    Closed,

    /// The queue could not be reached.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}
