// pulsefeed-server - process wiring
//
// Builds the stores, starts the pipeline, serves the HTTP surface and
// sequences shutdown: the listener stops accepting first, then the
// pipeline drains (close consumers, grace period, cancel timers).

mod handlers;
mod init;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::signal;
use tracing::info;

use pulsefeed_config::RuntimeConfig;
use pulsefeed_pipeline::{Pipeline, PipelineStores, ShutdownOutcome};
use pulsefeed_store::{
    MemoryCacheStore, MemoryCounterStore, MemoryDocumentStore, MemoryQueue, RetryPolicy,
};

use handlers::AppState;

/// Run the server until a termination signal, then drain the pipeline.
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init::init_tracing(&config);

    // In-memory backends; deployments swap in durable adapters behind the
    // same traits.
    let queue = Arc::new(MemoryQueue::new(RetryPolicy {
        attempts: config.queue.retry_attempts,
        backoff_base: config.queue.backoff_base(),
    }));
    let documents = Arc::new(MemoryDocumentStore::new());
    let counters = Arc::new(MemoryCounterStore::new());
    let cache = Arc::new(MemoryCacheStore::new());

    let stores = PipelineStores {
        queue: queue.clone(),
        documents,
        counters: counters.clone(),
        cache,
    };
    let pipeline = Pipeline::start(&config, stores);
    info!(
        max_jobs = config.batch.max_jobs,
        interval_ms = config.batch.interval_ms,
        tick_ms = config.batch.tick_ms,
        cache_enabled = config.cache.enabled,
        "pipeline started"
    );

    let state = AppState {
        queue,
        counters,
        cache: pipeline.response_cache().clone(),
    };

    let app = Router::new()
        .route("/v1/like", post(handlers::add_like))
        .route("/v1/like/:post_id", get(handlers::get_post_likes))
        .route("/v1/comment", post(handlers::add_comment))
        .route("/v1/comment/:post_id", get(handlers::get_post_comments))
        .route(
            "/v1/notification/read",
            post(handlers::mark_notifications_read),
        )
        .route("/health", get(handlers::health_check))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let addr = &config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("pulsefeed API listening on http://{addr}");
    info!("Press Ctrl+C or send SIGTERM to stop");

    // The listener stops accepting new connections once the signal fires;
    // the pipeline drains afterwards.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    match pipeline.graceful_shutdown("terminate").await {
        ShutdownOutcome::Clean => {
            info!("Server shutdown complete");
            Ok(())
        }
        ShutdownOutcome::AlreadyInProgress => Ok(()),
        ShutdownOutcome::Forced => {
            anyhow::bail!("shutdown exceeded the hard timeout; exiting without a full drain")
        }
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
