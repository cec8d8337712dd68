// Durable queue interface and in-memory implementation.
//
// Delivery is at-least-once: a job handed to a consumer that fails routing
// goes back through `retry` with exponential backoff until the attempt
// budget is spent, then dead-letters. Acknowledgement is implicit in a
// successful `next` + hand-off; a job buffered in an accumulator but not
// yet flushed is lost if the process dies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tracing::{debug, warn};

use pulsefeed_core::{QueueCategory, QueueJob};

use crate::error::QueueError;

/// One delivery of a job to a consumer. `attempt` starts at 1 and counts
/// redeliveries.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: QueueJob,
    pub attempt: u32,
}

/// Bounded retry with exponential backoff, applied when a consumer
/// callback fails.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total delivery attempts before dead-lettering.
    pub attempts: u32,
    /// Base delay; doubles per redelivery, plus up to 10% jitter.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff_base: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(2).min(16);
        let base = self.backoff_base.saturating_mul(1 << doublings);
        let jitter_cap = (base.as_millis() as u64 / 10).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        base + Duration::from_millis(jitter)
    }
}

/// Persistent, multi-consumer job queue with at-least-once delivery.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Accept a job. Returns immediately; never waits for a flush.
    async fn enqueue(&self, job: QueueJob) -> Result<(), QueueError>;

    /// Accept many jobs in one round trip.
    async fn enqueue_bulk(&self, jobs: Vec<QueueJob>) -> Result<(), QueueError>;

    /// Next delivery for `category`. Suspends until a job arrives; returns
    /// `None` once the queue is closed and the consumer should exit.
    async fn next(&self, category: QueueCategory) -> Result<Option<Delivery>, QueueError>;

    /// Hand a failed delivery back for redelivery with backoff. After the
    /// attempt budget is spent the job is dead-lettered.
    async fn retry(&self, delivery: Delivery) -> Result<(), QueueError>;

    /// Stop delivering jobs. Pending consumers wake up with `None`.
    async fn close(&self);
}

struct Channel {
    jobs: Mutex<VecDeque<Delivery>>,
    notify: Notify,
}

impl Channel {
    fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

struct QueueInner {
    like: Channel,
    comment: Channel,
    notification: Channel,
    closed: AtomicBool,
    policy: RetryPolicy,
    dead_letters: Mutex<Vec<QueueJob>>,
}

impl QueueInner {
    fn channel(&self, category: QueueCategory) -> &Channel {
        match category {
            QueueCategory::Like => &self.like,
            QueueCategory::Comment => &self.comment,
            QueueCategory::Notification => &self.notification,
        }
    }

    fn push(&self, delivery: Delivery) {
        if self.closed.load(Ordering::Acquire) {
            debug!(
                job = delivery.job.payload.name(),
                "dropping redelivery, queue closed"
            );
            return;
        }

        let channel = self.channel(delivery.job.category());
        channel.jobs.lock().push_back(delivery);
        channel.notify.notify_one();
    }
}

/// In-memory queue used by tests and local development. Durability is the
/// deployment backend's concern; the semantics (per-category channels,
/// retry, dead-letter) match what the pipeline expects from one.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<QueueInner>,
}

impl MemoryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                like: Channel::new(),
                comment: Channel::new(),
                notification: Channel::new(),
                closed: AtomicBool::new(false),
                policy,
                dead_letters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Jobs that exhausted their retry budget.
    pub fn dead_letters(&self) -> Vec<QueueJob> {
        self.inner.dead_letters.lock().clone()
    }

    /// Jobs currently waiting in `category`.
    pub fn pending(&self, category: QueueCategory) -> usize {
        self.inner.channel(category).jobs.lock().len()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl DurableQueue for MemoryQueue {
    async fn enqueue(&self, job: QueueJob) -> Result<(), QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        counter!("pulsefeed.queue.enqueued", 1);
        self.inner.push(Delivery { job, attempt: 1 });
        Ok(())
    }

    async fn enqueue_bulk(&self, jobs: Vec<QueueJob>) -> Result<(), QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        counter!("pulsefeed.queue.enqueued", jobs.len() as u64);
        for job in jobs {
            self.inner.push(Delivery { job, attempt: 1 });
        }
        Ok(())
    }

    async fn next(&self, category: QueueCategory) -> Result<Option<Delivery>, QueueError> {
        let channel = self.inner.channel(category);

        loop {
            let notified = channel.notify.notified();

            if let Some(delivery) = channel.jobs.lock().pop_front() {
                return Ok(Some(delivery));
            }

            if self.inner.closed.load(Ordering::Acquire) {
                return Ok(None);
            }

            notified.await;
        }
    }

    async fn retry(&self, delivery: Delivery) -> Result<(), QueueError> {
        let next_attempt = delivery.attempt + 1;

        if next_attempt > self.inner.policy.attempts {
            warn!(
                job = delivery.job.payload.name(),
                attempts = delivery.attempt,
                "retry budget exhausted, dead-lettering job"
            );
            counter!("pulsefeed.queue.dead_letters", 1);
            self.inner.dead_letters.lock().push(delivery.job);
            return Ok(());
        }

        let delay = self.inner.policy.delay_for(next_attempt);
        debug!(
            job = delivery.job.payload.name(),
            attempt = next_attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling redelivery"
        );

        let inner = Arc::clone(&self.inner);
        let job = delivery.job;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.push(Delivery {
                job,
                attempt: next_attempt,
            });
        });

        Ok(())
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for channel in [
            &self.inner.like,
            &self.inner.comment,
            &self.inner.notification,
        ] {
            // notify_one stores a permit for a consumer that has not yet
            // registered; notify_waiters wakes one that has.
            channel.notify.notify_one();
            channel.notify.notify_waiters();
        }
    }
}
