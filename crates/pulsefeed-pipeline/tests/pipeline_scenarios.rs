// End-to-end pipeline scenarios over the in-memory stores: enqueue ->
// consumer hand-off -> scheduled flush -> bulk apply -> counters, cache
// and notification fan-out.

use std::sync::Arc;
use std::time::Duration;

use pulsefeed_config::RuntimeConfig;
use pulsefeed_core::{CommentJob, EntityKind, LikeJob, LikeTarget, QueueCategory, QueueJob};
use pulsefeed_pipeline::{
    snapshots_for, Pipeline, PipelineStores, ShutdownOutcome, ShutdownState,
};
use pulsefeed_store::{
    DurableQueue, MemoryCacheStore, MemoryCounterStore, MemoryDocumentStore, MemoryQueue,
    RetryPolicy,
};

struct Harness {
    queue: MemoryQueue,
    documents: Arc<MemoryDocumentStore>,
    counters: Arc<MemoryCounterStore>,
    pipeline: Pipeline,
}

impl Harness {
    async fn likes_count(&self, post: &str) -> i64 {
        let snapshots =
            snapshots_for(self.counters.as_ref(), EntityKind::Post, &[post.to_string()]).await;
        snapshots[0].likes_count
    }

    async fn comments_count(&self, post: &str) -> i64 {
        let snapshots =
            snapshots_for(self.counters.as_ref(), EntityKind::Post, &[post.to_string()]).await;
        snapshots[0].comments_count
    }
}

fn fast_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.environment = "test".into();
    config.batch.max_jobs = 1000;
    config.batch.interval_ms = 10;
    config.batch.tick_ms = 25;
    config.shutdown.grace_ms = 300;
    config.shutdown.hard_timeout_ms = 5000;
    config
}

fn start(config: &RuntimeConfig) -> Harness {
    let queue = MemoryQueue::new(RetryPolicy {
        attempts: config.queue.retry_attempts,
        backoff_base: config.queue.backoff_base(),
    });
    let documents = Arc::new(MemoryDocumentStore::new());
    let counters = Arc::new(MemoryCounterStore::new());
    let stores = PipelineStores {
        queue: Arc::new(queue.clone()),
        documents: documents.clone(),
        counters: counters.clone(),
        cache: Arc::new(MemoryCacheStore::new()),
    };
    let pipeline = Pipeline::start(config, stores);

    Harness {
        queue,
        documents,
        counters,
        pipeline,
    }
}

fn like(post: &str, liker: &str) -> QueueJob {
    QueueJob::like(LikeJob {
        target: LikeTarget::Post,
        post: post.into(),
        comment: None,
        liker: liker.into(),
    })
}

fn comment(post: &str, author: &str, text: &str) -> QueueJob {
    QueueJob::comment(CommentJob {
        post: post.into(),
        parent_comment: None,
        author: author.into(),
        text: text.into(),
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn three_likes_flush_into_counter_and_fanout() {
    let harness = start(&fast_config());
    harness.documents.seed_post("p1", "owner");

    for liker in ["u1", "u2", "u3"] {
        harness.queue.enqueue(like("p1", liker)).await.unwrap();
    }

    // One like flush plus the follow-up notification flush.
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(harness.likes_count("p1").await, 3);
    assert_eq!(harness.documents.likes().len(), 3);

    let notifications = harness.documents.notifications();
    assert_eq!(notifications.len(), 3);
    assert!(notifications
        .iter()
        .all(|n| n.recipient == "owner" && !n.read));
    assert_eq!(harness.queue.pending(QueueCategory::Notification), 0);

    harness.pipeline.graceful_shutdown("test").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_like_across_batches_counts_once() {
    let harness = start(&fast_config());
    harness.documents.seed_post("p1", "owner");

    harness.queue.enqueue(like("p1", "u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.likes_count("p1").await, 1);

    // Same user races a second like into a later flush batch.
    harness.queue.enqueue(like("p1", "u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.likes_count("p1").await, 1);
    assert_eq!(harness.documents.likes().len(), 1);
    assert_eq!(harness.documents.notifications().len(), 1);

    harness.pipeline.graceful_shutdown("test").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn comment_flow_updates_counter_and_notifies_owner_only() {
    let harness = start(&fast_config());
    harness.documents.seed_post("p1", "owner");

    harness
        .queue
        .enqueue(comment("p1", "u1", "nice post"))
        .await
        .unwrap();
    harness
        .queue
        .enqueue(comment("p1", "owner", "thanks"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(harness.comments_count("p1").await, 2);
    assert_eq!(harness.documents.comments().len(), 2);

    // The owner's own comment produces no notification.
    let notifications = harness.documents.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].sender, "u1");
    assert_eq!(notifications[0].recipient, "owner");
    assert!(notifications[0].comment.is_some());

    harness.pipeline.graceful_shutdown("test").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_flushes_buffered_jobs_and_stops_timers() {
    let harness = start(&fast_config());
    harness.documents.seed_post("p1", "owner");

    harness.queue.enqueue(like("p1", "u1")).await.unwrap();
    // Enough time for the consumer hand-off, not necessarily for a flush.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = harness.pipeline.graceful_shutdown("SIGTERM").await;
    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(harness.pipeline.shutdown_state(), ShutdownState::Closed);

    // The buffered like flushed before the timers were cancelled.
    assert_eq!(harness.likes_count("p1").await, 1);
    assert!(harness.pipeline.accumulators().likes.lock().is_empty());
    assert!(!harness.pipeline.accumulators().likes.lock().is_flushing());

    // The queue no longer accepts work and a second signal is ignored.
    assert!(harness.queue.enqueue(like("p1", "u2")).await.is_err());
    assert_eq!(
        harness.pipeline.graceful_shutdown("SIGINT").await,
        ShutdownOutcome::AlreadyInProgress
    );
}
