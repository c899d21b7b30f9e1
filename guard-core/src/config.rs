//! Configuration for guarded mutations

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Guard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Evaluation configuration
    pub evaluation: EvaluationConfig,

    /// Confirmation polling configuration
    pub confirmation: ConfirmationConfig,

    /// Workflow configuration
    pub workflow: WorkflowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "guard-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            evaluation: EvaluationConfig::default(),
            confirmation: ConfirmationConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Deadline for all checks of one evaluation (0 = none)
    pub timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000, // 30s
        }
    }
}

impl EvaluationConfig {
    /// Deadline as a duration
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Confirmation polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// First poll interval (milliseconds)
    pub poll_interval_ms: u64,

    /// Upper bound for the poll interval (milliseconds)
    pub max_poll_interval_ms: u64,

    /// Interval growth per poll
    pub backoff_multiplier: f64,

    /// Default wait timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_poll_interval_ms: 12_000, // one block
            backoff_multiplier: 1.5,
            timeout_secs: 300,
        }
    }
}

impl ConfirmationConfig {
    /// Default wait timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Also wait for the final step's confirmation before reporting success
    pub await_final_step: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            await_final_step: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(timeout_ms) = env_number("GUARD_EVALUATION_TIMEOUT_MS")? {
            config.evaluation.timeout_ms = timeout_ms;
        }

        if let Some(interval_ms) = env_number("GUARD_POLL_INTERVAL_MS")? {
            config.confirmation.poll_interval_ms = interval_ms;
        }

        if let Some(timeout_secs) = env_number("GUARD_CONFIRMATION_TIMEOUT_SECS")? {
            config.confirmation.timeout_secs = timeout_secs;
        }

        if let Ok(value) = std::env::var("GUARD_AWAIT_FINAL_STEP") {
            config.workflow.await_final_step = value
                .parse()
                .map_err(|_| Error::Config(format!("Invalid GUARD_AWAIT_FINAL_STEP: {}", value)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the waiter cannot work with
    pub fn validate(&self) -> Result<()> {
        let c = &self.confirmation;
        if c.poll_interval_ms == 0 {
            return Err(Error::Config("confirmation.poll_interval_ms must be > 0".into()));
        }
        if c.max_poll_interval_ms < c.poll_interval_ms {
            return Err(Error::Config(
                "confirmation.max_poll_interval_ms must be >= poll_interval_ms".into(),
            ));
        }
        if !(c.backoff_multiplier >= 1.0) {
            return Err(Error::Config("confirmation.backoff_multiplier must be >= 1.0".into()));
        }
        Ok(())
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid {}: {}", name, value))),
        Err(_) => Ok(None),
    }
}
