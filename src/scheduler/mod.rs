// src/scheduler/mod.rs
mod coordinator;
mod worker;

use crate::check::CheckResult;
use crate::config::HealthConfig;
use crate::registry::{CheckFilter, Registry};
use coordinator::{Command, Coordinator};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Predicate over results, used by [`Scheduler::results`]. `None` means
/// "match all".
pub type ResultFilter = Arc<dyn Fn(&CheckResult) -> bool + Send + Sync>;

/// Handle over the coordination engine: one coordinator task owning all
/// shared state, one worker task per registered check, a process-wide lock
/// serializing checker execution, and cooperative shutdown.
///
/// A scheduler cannot be restarted; once stopped it stays stopped.
pub struct Scheduler {
    cmd_tx: mpsc::Sender<Command>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Scheduler {
    /// Start scheduling against `registry` with default tuning. Every
    /// already-registered check is scheduled immediately and checks
    /// registered later are picked up through the registry subscription;
    /// returns without waiting for any first run.
    pub fn start(registry: &Registry) -> Self {
        Self::start_with_config(registry, &HealthConfig::default())
    }

    pub fn start_with_config(registry: &Registry, config: &HealthConfig) -> Self {
        // Subscribe before snapshotting so a registration racing startup is
        // seen on at least one side; the coordinator dedupes by check ID.
        let registry_rx = registry.subscribe();
        let initial = registry.health_checks(None);

        let (cmd_tx, cmd_rx) = mpsc::channel(config.channels.command_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let coordinator = Coordinator::new(
            registry_rx,
            cmd_rx,
            cmd_tx.clone(),
            shutdown_rx.clone(),
            done_tx,
            config.channels.subscriber_capacity,
        );
        tokio::spawn(coordinator.run(initial));

        Self {
            cmd_tx,
            shutdown_tx,
            shutdown_rx,
            done_rx,
        }
    }

    /// Signal every worker to stop at its next opportunity. Idempotent and
    /// non-blocking; the first call wins.
    pub fn stop_async(&self) {
        self.shutdown_tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
    }

    /// True once [`stop_async`](Self::stop_async) has been called, even
    /// before shutdown completes.
    pub fn stopping(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Non-blocking view of [`done`](Self::done).
    pub fn is_done(&self) -> bool {
        *self.done_rx.borrow()
    }

    /// Resolves once every worker has exited and the coordinator has drained
    /// its queue; irreversible.
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Number of actively scheduled checks, answered by the coordinator;
    /// 0 once the scheduler has fully stopped.
    pub async fn health_check_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Count { reply })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Register a result subscriber; `None` delivers every result. Only
    /// results produced after this call are delivered. Once the scheduler has
    /// fully stopped the returned queue is already closed.
    pub async fn subscribe(&self, filter: Option<CheckFilter>) -> mpsc::Receiver<CheckResult> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Subscribe { filter, reply })
            .await
            .is_ok()
        {
            if let Ok(subscription) = rx.await {
                return subscription;
            }
        }
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        rx
    }

    /// Snapshot of the latest cached result per check ID matching `filter`;
    /// empty once the scheduler has fully stopped.
    pub async fn results(&self, filter: Option<ResultFilter>) -> Vec<CheckResult> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Snapshot { filter, reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}
