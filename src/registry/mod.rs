// src/registry/mod.rs

use crate::check::Check;
use crate::config::HealthConfig;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Predicate over checks, used for listing and for scheduler subscriptions.
/// `None` in the APIs that accept an `Option<CheckFilter>` means "match all".
pub type CheckFilter = Arc<dyn Fn(&Check) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("health check {0} is already registered")]
    AlreadyRegistered(Uuid),
}

struct Inner {
    /// Insertion-ordered; listing preserves registration order.
    checks: Vec<Arc<Check>>,
    subscribers: Vec<mpsc::Sender<Arc<Check>>>,
}

/// Concurrent-safe store of registered checks. Registration events fan out to
/// subscribers so a running scheduler picks up checks registered after it
/// started. Lives for the process lifetime; checks are never removed.
pub struct Registry {
    inner: Mutex<Inner>,
    subscriber_capacity: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(&HealthConfig::default())
    }

    pub fn with_config(config: &HealthConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                checks: Vec::new(),
                subscribers: Vec::new(),
            }),
            subscriber_capacity: config.channels.registry_subscriber_capacity,
        }
    }

    /// Register a check, rejecting duplicate IDs and leaving the registry
    /// unchanged on failure. Subscribers are notified from spawned tasks so a
    /// slow subscriber never blocks registration or the other subscribers;
    /// must be called from within a Tokio runtime.
    pub fn register(&self, check: Check) -> Result<(), RegistryError> {
        let check = Arc::new(check);
        let subscribers = {
            let mut inner = self.inner.lock().expect("registry lock poisoned");
            if inner.checks.iter().any(|c| c.id() == check.id()) {
                return Err(RegistryError::AlreadyRegistered(check.id()));
            }
            inner.checks.push(Arc::clone(&check));
            inner.subscribers.retain(|tx| !tx.is_closed());
            inner.subscribers.clone()
        };

        debug!(check_id = %check.id(), subscribers = subscribers.len(), "registered health check");
        for tx in subscribers {
            let check = Arc::clone(&check);
            tokio::spawn(async move {
                // Best-effort: the subscriber may have gone away.
                let _ = tx.send(check).await;
            });
        }
        Ok(())
    }

    /// Snapshot of registered checks; `None` returns all.
    pub fn health_checks(&self, filter: Option<CheckFilter>) -> Vec<Arc<Check>> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        match filter {
            None => inner.checks.clone(),
            Some(f) => inner
                .checks
                .iter()
                .filter(|c| f(c))
                .cloned()
                .collect(),
        }
    }

    /// A fresh queue receiving every check registered after this call.
    /// Earlier registrations are not replayed; there is no unsubscribe.
    pub fn subscribe(&self) -> mpsc::Receiver<Arc<Check>> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.subscribers.push(tx);
        rx
    }
}
