// src/scheduler/coordinator.rs

use super::worker;
use super::ResultFilter;
use crate::check::{Check, CheckResult};
use crate::registry::CheckFilter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Events processed one at a time by the coordinator. Every mutation of
/// scheduler state flows through here; queries carry a oneshot reply.
pub(crate) enum Command {
    Submit(CheckResult),
    WorkerStopped,
    Count {
        reply: oneshot::Sender<usize>,
    },
    Subscribe {
        filter: Option<CheckFilter>,
        reply: oneshot::Sender<mpsc::Receiver<CheckResult>>,
    },
    Snapshot {
        filter: Option<ResultFilter>,
        reply: oneshot::Sender<Vec<CheckResult>>,
    },
}

struct Subscriber {
    filter: Option<CheckFilter>,
    tx: mpsc::Sender<CheckResult>,
}

/// Single owner of all mutable scheduler state. Only this task touches the
/// worker count, the latest-result cache, and the subscriber list, so none of
/// it needs a lock.
pub(crate) struct Coordinator {
    registry_rx: mpsc::Receiver<Arc<Check>>,
    registry_open: bool,
    cmd_rx: mpsc::Receiver<Command>,
    cmd_tx: mpsc::Sender<Command>,
    shutdown_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
    run_lock: Arc<Mutex<()>>,
    subscriber_capacity: usize,
    checks: HashMap<Uuid, Arc<Check>>,
    latest: HashMap<Uuid, CheckResult>,
    subscribers: Vec<Subscriber>,
    worker_count: usize,
    stopping: bool,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry_rx: mpsc::Receiver<Arc<Check>>,
        cmd_rx: mpsc::Receiver<Command>,
        cmd_tx: mpsc::Sender<Command>,
        shutdown_rx: watch::Receiver<bool>,
        done_tx: watch::Sender<bool>,
        subscriber_capacity: usize,
    ) -> Self {
        Self {
            registry_rx,
            registry_open: true,
            cmd_rx,
            cmd_tx,
            shutdown_rx,
            done_tx,
            run_lock: Arc::new(Mutex::new(())),
            subscriber_capacity,
            checks: HashMap::new(),
            latest: HashMap::new(),
            subscribers: Vec::new(),
            worker_count: 0,
            stopping: false,
        }
    }

    pub(crate) async fn run(mut self, initial: Vec<Arc<Check>>) {
        for check in initial {
            self.spawn_worker(check);
        }

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed(), if !self.stopping => {
                    // A closed watch means the scheduler handle is gone; no
                    // one can stop us later, so treat it as a stop.
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.stopping = true;
                        debug!(workers = self.worker_count, "scheduler stopping");
                    }
                }
                Some(cmd) = self.cmd_rx.recv() => self.handle(cmd),
                check = self.registry_rx.recv(), if self.registry_open => {
                    match check {
                        Some(check) => self.spawn_worker(check),
                        None => self.registry_open = false,
                    }
                }
            }

            if self.stopping && self.worker_count == 0 {
                break;
            }
        }

        self.drain();
        // Dropping the subscriber senders closes every subscription queue.
        self.subscribers.clear();
        debug!("scheduler stopped");
        let _ = self.done_tx.send(true);
    }

    /// Schedule one worker per distinct check ID. A check can arrive both in
    /// the start snapshot and over the registry subscription; the second
    /// sighting is ignored.
    fn spawn_worker(&mut self, check: Arc<Check>) {
        if self.checks.contains_key(&check.id()) {
            return;
        }
        self.checks.insert(check.id(), Arc::clone(&check));
        self.worker_count += 1;
        debug!(check_id = %check.id(), interval = ?check.run_interval(), "scheduling health check");
        tokio::spawn(worker::run(
            check,
            self.cmd_tx.clone(),
            self.shutdown_rx.clone(),
            Arc::clone(&self.run_lock),
        ));
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(result) => self.submit(result),
            Command::WorkerStopped => self.worker_count -= 1,
            Command::Count { reply } => {
                let _ = reply.send(self.worker_count);
            }
            Command::Subscribe { filter, reply } => {
                let (tx, rx) = mpsc::channel(self.subscriber_capacity);
                self.subscribers.push(Subscriber { filter, tx });
                let _ = reply.send(rx);
            }
            Command::Snapshot { filter, reply } => {
                let results = match filter {
                    None => self.latest.values().cloned().collect(),
                    Some(f) => self.latest.values().filter(|r| f(r)).cloned().collect(),
                };
                let _ = reply.send(results);
            }
        }
    }

    /// Update the latest-result cache, then fan the result out to every
    /// matching subscriber on its own helper task so a slow reader cannot
    /// stall the coordinator or the other subscribers.
    fn submit(&mut self, result: CheckResult) {
        let check = match self.checks.get(&result.health_check_id) {
            Some(check) => Arc::clone(check),
            // A result for a check we never scheduled cannot match any
            // subscriber filter; cache it and move on.
            None => {
                self.latest.insert(result.health_check_id, result);
                return;
            }
        };
        self.latest.insert(result.health_check_id, result.clone());

        self.subscribers.retain(|s| !s.tx.is_closed());
        for subscriber in &self.subscribers {
            if let Some(filter) = &subscriber.filter {
                if !filter(&check) {
                    continue;
                }
            }
            let tx = subscriber.tx.clone();
            let result = result.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();
            tokio::spawn(async move {
                // Best-effort: a delivery racing shutdown may be dropped.
                tokio::select! {
                    _ = tx.send(result) => {}
                    _ = worker::shutdown_signalled(&mut shutdown_rx) => {}
                }
            });
        }
    }

    /// Process whatever is still queued once the last worker has exited, so
    /// late submissions still land in the result cache before `done` fires.
    fn drain(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.handle(cmd);
        }
    }
}
