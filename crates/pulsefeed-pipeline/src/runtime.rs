// Pipeline composition root.
//
// Owns the accumulators, spawns one consumer per queue category and one
// flush scheduler per accumulator, and wires the shutdown coordinator.
// Everything is explicitly constructed and dependency-injected; lifecycle
// is tied to `start`/`graceful_shutdown`, not to import order.

use std::sync::Arc;

use pulsefeed_config::RuntimeConfig;
use pulsefeed_core::{BatchPolicy, QueueCategory};
use pulsefeed_store::{CacheStore, CounterStore, DocumentStore, DurableQueue};

use crate::applier::BulkApplier;
use crate::cache::ResponseCache;
use crate::consumer::{run_consumer, Accumulators};
use crate::fanout::NotificationFanout;
use crate::scheduler::spawn_flush_loop;
use crate::shutdown::{shutdown_channel, ShutdownCoordinator, ShutdownOutcome, ShutdownState};

/// The shared stores the pipeline runs against. Real deployments inject
/// durable backends; tests inject the in-memory implementations.
#[derive(Clone)]
pub struct PipelineStores {
    pub queue: Arc<dyn DurableQueue>,
    pub documents: Arc<dyn DocumentStore>,
    pub counters: Arc<dyn CounterStore>,
    pub cache: Arc<dyn CacheStore>,
}

pub struct Pipeline {
    accumulators: Accumulators,
    response_cache: ResponseCache,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Pipeline {
    /// Build and start the pipeline. Must be called on a tokio runtime.
    pub fn start(config: &RuntimeConfig, stores: PipelineStores) -> Self {
        let policy = BatchPolicy {
            max_jobs: config.batch.max_jobs,
            max_age: config.batch.max_age(),
        };
        let accumulators = Accumulators::new(policy);

        let response_cache = ResponseCache::new(
            stores.cache.clone(),
            config.environment.clone(),
            config.cache.enabled,
            config.cache.ttl(),
        );
        let fanout = NotificationFanout::new(stores.queue.clone());
        let applier = BulkApplier::new(
            stores.documents.clone(),
            stores.counters.clone(),
            response_cache.clone(),
            fanout,
        );

        let mut consumer_tasks = Vec::new();
        for category in [
            QueueCategory::Like,
            QueueCategory::Comment,
            QueueCategory::Notification,
        ] {
            let queue = stores.queue.clone();
            let accumulators = accumulators.clone();
            consumer_tasks.push(tokio::spawn(run_consumer(queue, category, accumulators)));
        }

        let (timers, _signal) = shutdown_channel();
        let tick = config.batch.tick();
        let mut scheduler_tasks = Vec::new();

        {
            let applier = applier.clone();
            scheduler_tasks.push(spawn_flush_loop(
                "likes",
                accumulators.likes.clone(),
                tick,
                timers.subscribe(),
                move |jobs| {
                    let applier = applier.clone();
                    async move { applier.apply_likes(jobs).await }
                },
            ));
        }
        {
            let applier = applier.clone();
            scheduler_tasks.push(spawn_flush_loop(
                "comments",
                accumulators.comments.clone(),
                tick,
                timers.subscribe(),
                move |jobs| {
                    let applier = applier.clone();
                    async move { applier.apply_comments(jobs).await }
                },
            ));
        }
        {
            let applier = applier.clone();
            scheduler_tasks.push(spawn_flush_loop(
                "notifications",
                accumulators.notification_adds.clone(),
                tick,
                timers.subscribe(),
                move |jobs| {
                    let applier = applier.clone();
                    async move { applier.apply_notifications(jobs).await }
                },
            ));
        }
        {
            let applier = applier.clone();
            scheduler_tasks.push(spawn_flush_loop(
                "notification-reads",
                accumulators.notification_reads.clone(),
                tick,
                timers.subscribe(),
                move |jobs| {
                    let applier = applier.clone();
                    async move { applier.apply_mark_read(jobs).await }
                },
            ));
        }

        let coordinator = Arc::new(ShutdownCoordinator::new(
            stores.queue,
            timers,
            consumer_tasks,
            scheduler_tasks,
            config.shutdown.grace(),
            config.shutdown.hard_timeout(),
        ));

        Self {
            accumulators,
            response_cache,
            coordinator,
        }
    }

    pub fn accumulators(&self) -> &Accumulators {
        &self.accumulators
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.response_cache
    }

    pub fn shutdown_state(&self) -> ShutdownState {
        self.coordinator.state()
    }

    pub async fn graceful_shutdown(&self, signal: &str) -> ShutdownOutcome {
        self.coordinator.graceful_shutdown(signal).await
    }
}
