// Coordinated shutdown.
//
// Linear state machine, no re-entry:
// Running -> Draining (close queue, join consumers)
//         -> GracePeriodWait (in-flight flush ticks finish)
//         -> TimersCancelled (schedulers stop)
//         -> Closed
// A second signal while draining is ignored. A hard timeout bounds the
// whole sequence, trading durability for liveness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use pulsefeed_store::DurableQueue;

/// Create a linked cancellation pair for the flush timers.
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownController { tx }, ShutdownSignal(rx))
}

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal(self.tx.subscribe())
    }
}

/// Clonable cancellation token handed to every scheduler task.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Resolves once the controller triggers (or is dropped).
    pub async fn cancelled(&mut self) {
        if *self.0.borrow_and_update() {
            return;
        }
        while self.0.changed().await.is_ok() {
            if *self.0.borrow() {
                return;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    GracePeriodWait,
    TimersCancelled,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Draining finished inside the hard timeout.
    Clean,
    /// The hard timeout expired; the process must exit anyway.
    Forced,
    /// Another signal already started the sequence; this one was ignored.
    AlreadyInProgress,
}

pub struct ShutdownCoordinator {
    queue: Arc<dyn DurableQueue>,
    timers: ShutdownController,
    consumer_tasks: Mutex<Vec<JoinHandle<()>>>,
    scheduler_tasks: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<ShutdownState>,
    begun: AtomicBool,
    grace: Duration,
    hard_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        timers: ShutdownController,
        consumer_tasks: Vec<JoinHandle<()>>,
        scheduler_tasks: Vec<JoinHandle<()>>,
        grace: Duration,
        hard_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            timers,
            consumer_tasks: Mutex::new(consumer_tasks),
            scheduler_tasks: Mutex::new(scheduler_tasks),
            state: Mutex::new(ShutdownState::Running),
            begun: AtomicBool::new(false),
            grace,
            hard_timeout,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    /// Run the full drain sequence. Idempotent: only the first caller
    /// drives the state machine.
    pub async fn graceful_shutdown(&self, signal: &str) -> ShutdownOutcome {
        if self.begun.swap(true, Ordering::SeqCst) {
            debug!(signal, "shutdown already in progress, ignoring signal");
            return ShutdownOutcome::AlreadyInProgress;
        }

        info!(signal, "shutting down");

        match tokio::time::timeout(self.hard_timeout, self.drain()).await {
            Ok(()) => {
                self.enter(ShutdownState::Closed);
                info!("shutdown complete");
                ShutdownOutcome::Clean
            }
            Err(_) => {
                error!(
                    hard_timeout_ms = self.hard_timeout.as_millis() as u64,
                    "graceful shutdown exceeded hard timeout, forcing exit"
                );
                ShutdownOutcome::Forced
            }
        }
    }

    async fn drain(&self) {
        self.enter(ShutdownState::Draining);
        self.queue.close().await;
        for task in take_tasks(&self.consumer_tasks) {
            let _ = task.await;
        }

        // Jobs handed off before the close are still buffered; give their
        // flush ticks time to run before the timers die.
        self.enter(ShutdownState::GracePeriodWait);
        tokio::time::sleep(self.grace).await;

        self.enter(ShutdownState::TimersCancelled);
        self.timers.trigger();
        for task in take_tasks(&self.scheduler_tasks) {
            let _ = task.await;
        }
    }

    fn enter(&self, state: ShutdownState) {
        *self.state.lock() = state;
        info!(?state, "shutdown state");
    }
}

fn take_tasks(tasks: &Mutex<Vec<JoinHandle<()>>>) -> Vec<JoinHandle<()>> {
    std::mem::take(&mut *tasks.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_store::MemoryQueue;

    #[tokio::test]
    async fn signal_resolves_after_trigger() {
        let (controller, mut signal) = shutdown_channel();
        assert!(!signal.is_cancelled());

        controller.trigger();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn second_shutdown_signal_is_ignored() {
        let (timers, _signal) = shutdown_channel();
        let coordinator = ShutdownCoordinator::new(
            Arc::new(MemoryQueue::default()),
            timers,
            Vec::new(),
            Vec::new(),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );

        assert_eq!(
            coordinator.graceful_shutdown("SIGTERM").await,
            ShutdownOutcome::Clean
        );
        assert_eq!(coordinator.state(), ShutdownState::Closed);
        assert_eq!(
            coordinator.graceful_shutdown("SIGINT").await,
            ShutdownOutcome::AlreadyInProgress
        );
    }

    #[tokio::test]
    async fn hard_timeout_forces_the_outcome() {
        // A consumer task that never finishes keeps draining stuck.
        let stuck = tokio::spawn(async {
            std::future::pending::<()>().await;
        });

        let (timers, _signal) = shutdown_channel();
        let coordinator = ShutdownCoordinator::new(
            Arc::new(MemoryQueue::default()),
            timers,
            vec![stuck],
            Vec::new(),
            Duration::from_millis(10),
            Duration::from_millis(50),
        );

        assert_eq!(
            coordinator.graceful_shutdown("SIGTERM").await,
            ShutdownOutcome::Forced
        );
        assert_ne!(coordinator.state(), ShutdownState::Closed);
    }
}
