//! Daemon configuration
//!
//! ```toml
//! listen_addr = "127.0.0.1:8280"
//! keystore_path = "/var/lib/node/seed.hex"
//! genesis_path = "/etc/node/genesis.toml"
//!
//! [guard.confirmation]
//! timeout_secs = 120
//!
//! [ledger]
//! block_time_ms = 2000
//! ```

use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Loopback address to serve on
    pub listen_addr: String,

    /// Hex seed file; absent means signing is unavailable
    pub keystore_path: Option<PathBuf>,

    /// TOML state seeding the simulated ledger
    pub genesis_path: Option<PathBuf>,

    /// Guard settings
    pub guard: guard_core::Config,

    /// Simulated ledger settings
    pub ledger: ledger_sim::Config,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let guard = guard_core::Config {
            service_name: "node-daemon".to_string(),
            ..guard_core::Config::default()
        };
        Self {
            listen_addr: "127.0.0.1:8280".to_string(),
            keystore_path: None,
            genesis_path: None,
            guard,
            ledger: ledger_sim::Config {
                block_time_ms: 2_000,
                ..ledger_sim::Config::default()
            },
        }
    }
}

impl DaemonConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = DaemonConfig {
            guard: guard_core::Config {
                service_name: "node-daemon".to_string(),
                ..guard_core::Config::from_env()?
            },
            ledger: ledger_sim::Config::from_env()?,
            ..DaemonConfig::default()
        };

        if let Ok(addr) = std::env::var("NODE_DAEMON_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("NODE_DAEMON_KEYSTORE") {
            config.keystore_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("NODE_DAEMON_GENESIS") {
            config.genesis_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Parsed listen address; must be loopback
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr: SocketAddr = self
            .listen_addr
            .parse()
            .map_err(|_| DaemonError::Config(format!("Invalid listen_addr: {}", self.listen_addr)))?;
        if !addr.ip().is_loopback() {
            return Err(DaemonError::Config(format!(
                "listen_addr must be a loopback address, got {}",
                addr
            )));
        }
        Ok(addr)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.guard.validate()?;
        self.ledger.validate()?;
        Ok(())
    }
}
