// src/check/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Health severity, in increasing order of impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    Red,
}

impl Status {
    /// Numeric severity for external gauges: Green=0, Yellow=1, Red=2.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Green => 0,
            Status::Yellow => 1,
            Status::Red => 2,
        }
    }
}

/// Non-green outcome returned by a checker. A checker that returns `None`
/// reports Green.
#[derive(Debug, Clone)]
pub struct Failure {
    status: Status,
    message: String,
}

impl Failure {
    pub fn yellow(message: impl Into<String>) -> Self {
        Self {
            status: Status::Yellow,
            message: message.into(),
        }
    }

    pub fn red(message: impl Into<String>) -> Self {
        Self {
            status: Status::Red,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error payload carried by a non-green [`CheckResult`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CheckError {
    #[error("health check timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("health check panicked: {0}")]
    Panicked(String),
}

/// Immutable outcome of one check execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub health_check_id: Uuid,
    /// Wall-clock time the execution started.
    pub time: DateTime<Utc>,
    /// Measured from call start to whichever finished first: the checker or
    /// its timeout.
    pub duration: Duration,
    pub status: Status,
    pub error: Option<CheckError>,
}

impl CheckResult {
    pub fn green(&self) -> bool {
        self.status == Status::Green
    }
}
