//! # Node Daemon
//!
//! Boundary adapter between front-ends and the guard. Serves the operation
//! catalogue over HTTP on a loopback address and ships a typed client.
//!
//! In local mode the daemon runs against the simulated ledger, seeded from
//! a genesis file, with state transitions for every catalogued operation.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod transitions;

pub use client::DaemonClient;
pub use config::DaemonConfig;
pub use error::{DaemonError, Result};

use guard_core::{Capabilities, Guard, Keystore};
use ledger_sim::{Genesis, LedgerBuilder, LedgerHandle};
use std::sync::Arc;
use tracing::{info, warn};

/// Guard wired to a running simulated ledger
#[derive(Debug)]
pub struct LocalNode {
    /// Guard serving the API
    pub guard: Arc<Guard>,
    /// Ledger control handle
    pub ledger: LedgerHandle,
}

/// Open the keystore named by the config; no path means a locked keystore
pub fn open_keystore(config: &DaemonConfig) -> Result<Keystore> {
    match &config.keystore_path {
        Some(path) => {
            let keystore = Keystore::from_file(path)?;
            info!("Loaded node key from {}", path.display());
            Ok(keystore)
        }
        None => {
            warn!("No keystore configured; signing is unavailable");
            Ok(Keystore::locked())
        }
    }
}

/// Start the simulated ledger and build a guard over it
pub fn start_local(config: &DaemonConfig, keystore: Keystore) -> Result<LocalNode> {
    let genesis = match &config.genesis_path {
        Some(path) => Genesis::from_file(path)?,
        None => Genesis::new(),
    };

    let ledger = LedgerBuilder::new(config.ledger.clone())
        .genesis(genesis)
        .hooks(transitions::hooks())
        .spawn();

    let capabilities = Capabilities {
        reader: Arc::new(ledger.clone()),
        signer: Arc::new(keystore),
        submitter: Arc::new(ledger.clone()),
        receipts: Arc::new(ledger.clone()),
    };
    let guard = Guard::new(config.guard.clone(), node_operations::registry()?, capabilities)?;

    Ok(LocalNode {
        guard: Arc::new(guard),
        ledger,
    })
}
