// pulsefeed-store - Shared-store interfaces for the pipeline
//
// The durable queue, primary document store, counter store and response
// cache are external collaborators; the pipeline only depends on the traits
// here. The in-memory implementations back tests and local development and
// model the semantics the pipeline relies on: partial-success bulk inserts,
// at-least-once delivery with bounded retry, atomic counter increments.

pub mod cache;
pub mod counter;
pub mod document;
pub mod error;
pub mod queue;

pub use cache::{CacheStore, MemoryCacheStore};
pub use counter::{CounterStore, MemoryCounterStore};
pub use document::{
    BulkInsertOutcome, DocumentStore, InsertFailure, InsertFailureReason, MemoryDocumentStore,
};
pub use error::{QueueError, StoreError};
pub use queue::{Delivery, DurableQueue, MemoryQueue, RetryPolicy};
