//! Configuration for the simulated ledger

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Produce a block every N milliseconds (0 = only on `mine()`)
    pub block_time_ms: u64,

    /// Bounded mailbox size
    pub mailbox_capacity: usize,

    /// Block number at startup
    pub genesis_block: u64,

    /// Chain timestamp at startup (unix seconds)
    pub genesis_timestamp: u64,

    /// Timestamp advance per block
    pub seconds_per_block: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_time_ms: 0,
            mailbox_capacity: 1000, // Bounded channel for backpressure
            genesis_block: 1,
            genesis_timestamp: 1_700_000_000,
            seconds_per_block: 12,
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

        if let Ok(value) = std::env::var("LEDGER_SIM_BLOCK_TIME_MS") {
            config.block_time_ms = value
                .parse()
                .map_err(|_| Error::Config(format!("Invalid LEDGER_SIM_BLOCK_TIME_MS: {}", value)))?;
        }

        if let Ok(value) = std::env::var("LEDGER_SIM_SECONDS_PER_BLOCK") {
            config.seconds_per_block = value.parse().map_err(|_| {
                Error::Config(format!("Invalid LEDGER_SIM_SECONDS_PER_BLOCK: {}", value))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(Error::Config("mailbox_capacity must be > 0".into()));
        }
        Ok(())
    }
}
