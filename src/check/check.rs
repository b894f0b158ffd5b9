// src/check/check.rs

use super::descriptor::{Desc, ValidationError};
use super::result::{CheckError, CheckResult, Failure, Status};
use crate::config::Limits;
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

/// A single health probe. Returning `None` reports Green; returning a
/// [`Failure`] reports Yellow or Red. Checkers are expected to be
/// cooperative: an execution that outlives the check's timeout is abandoned,
/// not cancelled.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self) -> Option<Failure>;
}

/// Adapter lifting an async closure into a [`Checker`].
pub struct CheckFn<F>(pub F);

#[async_trait]
impl<F, Fut> Checker for CheckFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<Failure>> + Send,
{
    async fn check(&self) -> Option<Failure> {
        (self.0)().await
    }
}

/// A schedulable, time-bounded unit of health verification. Immutable once
/// built; once registered it lives for the scheduler's lifetime.
#[derive(Clone)]
pub struct Check {
    desc: Arc<Desc>,
    id: Uuid,
    description: String,
    yellow_impact: Option<String>,
    red_impact: String,
    checker: Arc<dyn Checker>,
    timeout: Duration,
    run_interval: Duration,
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Check")
            .field("id", &self.id)
            .field("desc_id", &self.desc.id())
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .field("run_interval", &self.run_interval)
            .finish()
    }
}

impl Check {
    pub fn builder() -> CheckBuilder {
        CheckBuilder::new()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn yellow_impact(&self) -> Option<&str> {
        self.yellow_impact.as_deref()
    }

    pub fn red_impact(&self) -> &str {
        &self.red_impact
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn run_interval(&self) -> Duration {
        self.run_interval
    }

    /// Execute the checker once, racing it against this check's timeout.
    ///
    /// The checker runs on its own task so that a panic inside it is caught
    /// at the join point and reported as a Red result instead of tearing down
    /// the caller. On timeout the result is Red and the checker's eventual
    /// return value is discarded.
    pub async fn run(&self) -> CheckResult {
        let time = Utc::now();
        let start = Instant::now();
        let checker = Arc::clone(&self.checker);
        let handle = tokio::spawn(async move { checker.check().await });

        let outcome = timeout(self.timeout, handle).await;
        let duration = start.elapsed();

        let (status, error) = match outcome {
            Ok(Ok(None)) => (Status::Green, None),
            Ok(Ok(Some(failure))) => (
                failure.status(),
                Some(CheckError::Failed(failure.message().to_string())),
            ),
            Ok(Err(join_err)) => {
                let reason = match join_err.try_into_panic() {
                    Ok(panic) => panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "opaque panic payload".to_string()),
                    Err(join_err) => join_err.to_string(),
                };
                (Status::Red, Some(CheckError::Panicked(reason)))
            }
            Err(_) => (Status::Red, Some(CheckError::Timeout(self.timeout))),
        };

        CheckResult {
            health_check_id: self.id,
            time,
            duration,
            status,
            error,
        }
    }
}

/// Validating builder for [`Check`]. Trims string fields, applies defaults
/// from [`Limits`] for unset durations, and aggregates every violated
/// constraint into one [`ValidationError`].
pub struct CheckBuilder {
    desc: Option<Arc<Desc>>,
    id: Option<Uuid>,
    description: String,
    yellow_impact: Option<String>,
    red_impact: String,
    checker: Option<Arc<dyn Checker>>,
    timeout: Option<Duration>,
    run_interval: Option<Duration>,
    limits: Limits,
}

impl Default for CheckBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckBuilder {
    pub fn new() -> Self {
        Self {
            desc: None,
            id: None,
            description: String::new(),
            yellow_impact: None,
            red_impact: String::new(),
            checker: None,
            timeout: None,
            run_interval: None,
            limits: Limits::default(),
        }
    }

    pub fn desc(mut self, desc: Arc<Desc>) -> Self {
        self.desc = Some(desc);
        self
    }

    /// Explicit identifier; a fresh time-ordered one is generated if unset.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn yellow_impact(mut self, impact: impl Into<String>) -> Self {
        self.yellow_impact = Some(impact.into());
        self
    }

    pub fn red_impact(mut self, impact: impl Into<String>) -> Self {
        self.red_impact = impact.into();
        self
    }

    pub fn checker(mut self, checker: Arc<dyn Checker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Convenience for closure-based checkers.
    pub fn checker_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Failure>> + Send + 'static,
    {
        self.checker = Some(Arc::new(CheckFn(f)));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn run_interval(mut self, run_interval: Duration) -> Self {
        self.run_interval = Some(run_interval);
        self
    }

    /// Override the default bounds, typically from a loaded
    /// [`HealthConfig`](crate::config::HealthConfig).
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<Check, ValidationError> {
        let description = self.description.trim().to_string();
        let red_impact = self.red_impact.trim().to_string();
        let yellow_impact = self
            .yellow_impact
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let timeout = self.timeout.unwrap_or_else(|| self.limits.default_timeout());
        let run_interval = self
            .run_interval
            .unwrap_or_else(|| self.limits.default_run_interval());

        let mut violations = Vec::new();
        if self.desc.is_none() {
            violations.push("descriptor is required".to_string());
        }
        if description.is_empty() {
            violations.push("description must not be blank".to_string());
        }
        if red_impact.is_empty() {
            violations.push("red impact must not be blank".to_string());
        }
        if self.checker.is_none() {
            violations.push("checker is required".to_string());
        }
        if timeout.is_zero() {
            violations.push("timeout must be greater than zero".to_string());
        }
        if timeout > self.limits.max_run_timeout() {
            violations.push(format!(
                "timeout must not exceed {:?}",
                self.limits.max_run_timeout()
            ));
        }
        if run_interval < self.limits.min_run_interval() {
            violations.push(format!(
                "run interval must be at least {:?}",
                self.limits.min_run_interval()
            ));
        }
        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        Ok(Check {
            // violations is empty, so desc and checker are present
            desc: self.desc.unwrap(),
            id: self.id.unwrap_or_else(Uuid::now_v7),
            description,
            yellow_impact,
            red_impact,
            checker: self.checker.unwrap(),
            timeout,
            run_interval,
        })
    }
}
