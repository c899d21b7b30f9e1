//! Error types for the simulated ledger

use thiserror::Error;

/// Result type for simulator control operations
pub type Result<T> = std::result::Result<T, Error>;

/// Simulator errors
#[derive(Error, Debug)]
pub enum Error {
    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Genesis file could not be read or parsed
    #[error("Genesis error: {0}")]
    Genesis(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn mailbox_closed() -> Self {
        Error::Concurrency("Actor mailbox closed".to_string())
    }

    pub(crate) fn response_dropped() -> Self {
        Error::Concurrency("Response channel closed".to_string())
    }
}
