//! Error types for the daemon and its client

use guard_core::TransactionHandle;
use thiserror::Error;

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Daemon errors
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Guard error
    #[error("Guard error: {0}")]
    Guard(#[from] guard_core::Error),

    /// Simulated ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_sim::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A client call failed
    #[error("{0}")]
    Client(String),

    /// A workflow run stopped early
    #[error("{reason}")]
    WorkflowHalted {
        /// Step that halted
        step: usize,
        /// Steps completed before the halt
        completed: usize,
        /// Handles of submitted steps
        tx_hashes: Vec<TransactionHandle>,
        /// Cause, as reported by the daemon
        reason: String,
    },
}

impl DaemonError {
    /// Wrap a client failure as `Could not <verb> <target>: <cause>`
    pub(crate) fn client(verb: &str, target: &str, cause: impl std::fmt::Display) -> Self {
        DaemonError::Client(format!("Could not {} {}: {}", verb, target, cause))
    }
}
