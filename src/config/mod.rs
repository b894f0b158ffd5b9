// src/config/mod.rs

use crate::check::ValidationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunable bounds applied when building checks. Durations are carried in
/// milliseconds so they deserialize from plain numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_min_run_interval_ms")]
    pub min_run_interval_ms: u64,
    #[serde(default = "default_max_run_timeout_ms")]
    pub max_run_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_run_interval_ms")]
    pub default_run_interval_ms: u64,
}

fn default_min_run_interval_ms() -> u64 {
    1_000
}

fn default_max_run_timeout_ms() -> u64 {
    10_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_run_interval_ms() -> u64 {
    15_000
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_run_interval_ms: default_min_run_interval_ms(),
            max_run_timeout_ms: default_max_run_timeout_ms(),
            default_timeout_ms: default_timeout_ms(),
            default_run_interval_ms: default_run_interval_ms(),
        }
    }
}

impl Limits {
    pub fn min_run_interval(&self) -> Duration {
        Duration::from_millis(self.min_run_interval_ms)
    }

    pub fn max_run_timeout(&self) -> Duration {
        Duration::from_millis(self.max_run_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn default_run_interval(&self) -> Duration {
        Duration::from_millis(self.default_run_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if self.min_run_interval_ms == 0 {
            violations.push("min run interval must be greater than zero".to_string());
        }
        if self.default_timeout_ms == 0 {
            violations.push("default timeout must be greater than zero".to_string());
        }
        if self.default_timeout_ms > self.max_run_timeout_ms {
            violations.push("default timeout must not exceed max run timeout".to_string());
        }
        if self.default_run_interval_ms < self.min_run_interval_ms {
            violations.push("default run interval must not be below the floor".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

/// Capacities for the scheduler's internal queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channels {
    #[serde(default = "default_registry_subscriber_capacity")]
    pub registry_subscriber_capacity: usize,
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_registry_subscriber_capacity() -> usize {
    16
}

fn default_command_capacity() -> usize {
    64
}

fn default_subscriber_capacity() -> usize {
    16
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            registry_subscriber_capacity: default_registry_subscriber_capacity(),
            command_capacity: default_command_capacity(),
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

impl Channels {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if self.registry_subscriber_capacity == 0 {
            violations.push("registry subscriber capacity must be greater than zero".to_string());
        }
        if self.command_capacity == 0 {
            violations.push("command capacity must be greater than zero".to_string());
        }
        if self.subscriber_capacity == 0 {
            violations.push("subscriber capacity must be greater than zero".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub channels: Channels,
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.limits.validate()?;
        self.channels.validate()
    }
}

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<HealthConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read config file")?;

    let ext = path.extension().and_then(|s| s.to_str());
    let config: HealthConfig = if ext == Some("yaml") || ext == Some("yml") {
        serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON config")?
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HealthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.min_run_interval(), Duration::from_secs(1));
        assert_eq!(config.limits.max_run_timeout(), Duration::from_secs(10));
        assert_eq!(config.limits.default_timeout(), Duration::from_secs(5));
        assert_eq!(config.limits.default_run_interval(), Duration::from_secs(15));
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: HealthConfig =
            serde_yaml::from_str("limits:\n  min_run_interval_ms: 250\n").unwrap();
        assert_eq!(config.limits.min_run_interval_ms, 250);
        assert_eq!(config.limits.max_run_timeout_ms, 10_000);
        assert_eq!(config.channels.command_capacity, 64);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let limits = Limits {
            default_timeout_ms: 20_000,
            ..Limits::default()
        };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("max run timeout"));
    }
}
