// src/scheduler/worker.rs

use super::coordinator::Command;
use crate::check::Check;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::sleep;
use tracing::debug;

/// Resolves once the shutdown watch is raised. A closed watch channel counts
/// as raised: an orphaned scheduler handle means nobody can stop us later.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Per-check scheduling loop: run immediately, submit the result, wait the
/// check's interval, repeat. The shutdown watch is observed at every
/// suspension point; on exit the coordinator is always told so its worker
/// accounting stays balanced.
pub(crate) async fn run(
    check: Arc<Check>,
    cmd_tx: mpsc::Sender<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
    run_lock: Arc<Mutex<()>>,
) {
    loop {
        // Covers workers spawned after shutdown began: they exit on their
        // first wait without ever running the checker.
        if *shutdown_rx.borrow_and_update() {
            break;
        }

        // Execution is serialized process-wide; waiting for the interval is
        // not.
        let result = tokio::select! {
            guard = run_lock.lock() => {
                let _guard = guard;
                check.run().await
            }
            _ = shutdown_signalled(&mut shutdown_rx) => break,
        };

        tokio::select! {
            sent = cmd_tx.send(Command::Submit(result)) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = shutdown_signalled(&mut shutdown_rx) => break,
        }

        tokio::select! {
            _ = sleep(check.run_interval()) => {}
            _ = shutdown_signalled(&mut shutdown_rx) => break,
        }
    }

    debug!(check_id = %check.id(), "health check worker stopped");
    let _ = cmd_tx.send(Command::WorkerStopped).await;
}
