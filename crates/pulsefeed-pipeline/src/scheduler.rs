// Flush scheduling.
//
// One recurring tick per accumulator. A tick drains the buffer if the
// flush policy trips, awaits the bulk applier and then clears the flushing
// gate - unconditionally, so an applier error can never wedge the
// accumulator. Ticks for the same accumulator cannot overlap (the gate is
// part of the flush policy); ticks for different accumulators run freely
// in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use pulsefeed_core::{ApplyReport, JobBatch};
use pulsefeed_store::StoreError;

use crate::shutdown::ShutdownSignal;

/// Spawn the recurring flush loop for one accumulator. The task runs until
/// `shutdown` fires; a flush already in progress completes before the task
/// observes the cancellation.
pub fn spawn_flush_loop<T, F, Fut>(
    name: &'static str,
    accumulator: Arc<Mutex<JobBatch<T>>>,
    tick: std::time::Duration,
    mut shutdown: ShutdownSignal,
    apply: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApplyReport, StoreError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => flush_once(name, &accumulator, &apply).await,
                _ = shutdown.cancelled() => break,
            }
        }

        info!(scheduler = name, "flush scheduler stopped");
    })
}

async fn flush_once<T, F, Fut>(name: &'static str, accumulator: &Mutex<JobBatch<T>>, apply: &F)
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<ApplyReport, StoreError>>,
{
    // Never hold the buffer lock across the applier await.
    let drained = { accumulator.lock().drain(Instant::now()) };
    if drained.is_empty() {
        return;
    }

    let size = drained.len();
    let started = Instant::now();
    counter!("pulsefeed.flush.batches", 1);
    histogram!("pulsefeed.flush.jobs", size as f64);

    match apply(drained).await {
        Ok(report) => {
            info!(
                scheduler = name,
                jobs = size,
                applied = report.applied,
                dropped = report.dropped_missing_parent,
                duplicates = report.duplicates,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "flushed batch"
            );
            for failure in &report.soft_failures {
                warn!(
                    scheduler = name,
                    effect = %failure.effect,
                    detail = %failure.detail,
                    "soft failure during flush"
                );
            }
            counter!("pulsefeed.flush.applied", report.applied as u64);
            counter!(
                "pulsefeed.flush.soft_failures",
                report.soft_failures.len() as u64
            );
        }
        Err(err) => {
            // All-or-nothing infrastructure failure; the drained jobs are
            // gone, matching the pipeline's lossy durability contract.
            error!(scheduler = name, jobs = size, error = %err, "flush failed, batch dropped");
            counter!("pulsefeed.flush.failures", 1);
        }
    }

    accumulator.lock().complete_flush(Instant::now());
}
