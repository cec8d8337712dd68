// Notification fan-out.
//
// Derived notification events go back onto the durable queue as new jobs;
// a separate accumulator applies them with the same drain/flush discipline
// as the batch that produced them.

use std::sync::Arc;

use metrics::counter;

use pulsefeed_core::{NotificationJob, QueueJob};
use pulsefeed_store::{DurableQueue, QueueError};

#[derive(Clone)]
pub struct NotificationFanout {
    queue: Arc<dyn DurableQueue>,
}

impl NotificationFanout {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }

    /// Bulk-enqueue notification jobs. Empty input is a true no-op.
    pub async fn enqueue(&self, jobs: Vec<NotificationJob>) -> Result<usize, QueueError> {
        if jobs.is_empty() {
            return Ok(0);
        }

        let count = jobs.len();
        let queue_jobs = jobs.into_iter().map(QueueJob::notification).collect();
        self.queue.enqueue_bulk(queue_jobs).await?;
        counter!("pulsefeed.fanout.enqueued", count as u64);
        Ok(count)
    }
}
