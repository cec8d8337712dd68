// Batch consumers: one task per queue category.
//
// A consumer pulls one delivery at a time and hands it to the matching
// accumulator; it never performs the write itself. The hand-off is the
// acknowledgement - from the queue's point of view the job is done once it
// sits in the buffer, which is what makes buffered-but-unflushed jobs lossy
// on crash.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use pulsefeed_core::{
    BatchPolicy, CommentJob, CommentQueueJob, JobBatch, JobPayload, LikeJob, LikeQueueJob,
    MarkReadJob, NotificationJob, NotificationQueueJob, QueueCategory,
};
use pulsefeed_store::DurableQueue;

/// The four buffers, one per flushed entity type. Consumers push under the
/// mutex; schedulers drain under the same mutex, so buffer access is
/// serialized per accumulator while the accumulators stay independent.
#[derive(Clone)]
pub struct Accumulators {
    pub likes: Arc<Mutex<JobBatch<LikeJob>>>,
    pub comments: Arc<Mutex<JobBatch<CommentJob>>>,
    pub notification_adds: Arc<Mutex<JobBatch<NotificationJob>>>,
    pub notification_reads: Arc<Mutex<JobBatch<MarkReadJob>>>,
}

impl Accumulators {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            likes: Arc::new(Mutex::new(JobBatch::new(policy))),
            comments: Arc::new(Mutex::new(JobBatch::new(policy))),
            notification_adds: Arc::new(Mutex::new(JobBatch::new(policy))),
            notification_reads: Arc::new(Mutex::new(JobBatch::new(policy))),
        }
    }
}

struct Misrouted {
    category: QueueCategory,
    name: &'static str,
}

/// Consume `category` until the queue closes.
pub async fn run_consumer(
    queue: Arc<dyn DurableQueue>,
    category: QueueCategory,
    accumulators: Accumulators,
) {
    info!(%category, "consumer started");

    loop {
        let delivery = match queue.next(category).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => break,
            Err(err) => {
                error!(%category, error = %err, "queue receive failed");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        match route(category, delivery.job.payload.clone(), &accumulators) {
            Ok(name) => {
                counter!("pulsefeed.consumer.handoffs", 1);
                debug!(%category, job = name, attempt = delivery.attempt, "job buffered");
            }
            Err(misrouted) => match category {
                // A foreign job on the notification queue is fatal to that
                // job: send it back through retry/backoff.
                QueueCategory::Notification => {
                    warn!(
                        %category,
                        job = misrouted.name,
                        "unexpected job on notification queue, retrying"
                    );
                    if let Err(err) = queue.retry(delivery).await {
                        error!(%category, error = %err, "failed to schedule retry");
                    }
                }
                // Like/comment queues ignore unrecognized jobs.
                _ => {
                    warn!(
                        category = %misrouted.category,
                        job = misrouted.name,
                        "ignoring misrouted job"
                    );
                }
            },
        }
    }

    info!(%category, "consumer stopped");
}

fn route(
    category: QueueCategory,
    payload: JobPayload,
    accumulators: &Accumulators,
) -> Result<&'static str, Misrouted> {
    match (category, payload) {
        (QueueCategory::Like, JobPayload::Like(job)) => {
            let LikeQueueJob::LikePost(job) = job;
            accumulators.likes.lock().push(job);
            Ok("like-post")
        }
        (QueueCategory::Comment, JobPayload::Comment(job)) => {
            let CommentQueueJob::CommentOnPost(job) = job;
            accumulators.comments.lock().push(job);
            Ok("comment-on-post")
        }
        (QueueCategory::Notification, JobPayload::Notification(job)) => match job {
            NotificationQueueJob::AddNotification(job) => {
                accumulators.notification_adds.lock().push(job);
                Ok("add-notification")
            }
            NotificationQueueJob::MarkNotificationsRead(job) => {
                accumulators.notification_reads.lock().push(job);
                Ok("mark-notifications-read")
            }
        },
        (category, payload) => Err(Misrouted {
            category,
            name: payload.name(),
        }),
    }
}
