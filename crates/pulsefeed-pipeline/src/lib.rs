// pulsefeed-pipeline - The asynchronous write-aggregation pipeline
//
// Consumers pull jobs off the durable queue into per-entity accumulators;
// flush schedulers drain ready batches into the bulk appliers, which write
// the primary store with partial-failure tolerance and fan out counter
// increments, cache invalidations and notification jobs. The shutdown
// coordinator sequences draining so an in-flight flush is never orphaned.

pub mod applier;
pub mod cache;
pub mod consumer;
pub mod counters;
pub mod fanout;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;

pub use applier::BulkApplier;
pub use cache::ResponseCache;
pub use consumer::{run_consumer, Accumulators};
pub use counters::snapshots_for;
pub use fanout::NotificationFanout;
pub use runtime::{Pipeline, PipelineStores};
pub use scheduler::spawn_flush_loop;
pub use shutdown::{
    shutdown_channel, ShutdownController, ShutdownCoordinator, ShutdownOutcome, ShutdownSignal,
    ShutdownState,
};
