//! Error types for guarded mutations

use crate::types::{ConfirmationStatus, StateKey, TransactionHandle};
use thiserror::Error;

/// Result type for guard operations
pub type Result<T> = std::result::Result<T, Error>;

/// A State Reader call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Remote endpoint did not answer
    #[error("Query for {key} failed: {reason}")]
    Unavailable {
        /// Key being read
        key: StateKey,
        /// Transport-level cause
        reason: String,
    },

    /// Key is not known to the remote ledger
    #[error("Unknown state key: {0}")]
    UnknownKey(StateKey),

    /// Value came back with an unexpected kind
    #[error("Malformed value for {key}: expected {expected}, found {found}")]
    Malformed {
        /// Key being read
        key: StateKey,
        /// Kind the predicate asked for
        expected: &'static str,
        /// Kind the ledger returned
        found: &'static str,
    },

    /// Evaluation deadline elapsed before every check answered
    #[error("Evaluation exceeded its {after_ms}ms deadline")]
    DeadlineExceeded {
        /// Configured deadline
        after_ms: u64,
    },
}

/// The signing collaborator could not produce an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// No credentials are loaded
    #[error("no signing credentials are loaded")]
    Unavailable,

    /// Credentials are present but refuse this request
    #[error("signer refused: {0}")]
    Unauthorized(String),
}

/// Initial dispatch of a signed envelope failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// Signer refused to authorize the operation
    #[error("Authorization refused: {0}")]
    Unauthorized(String),

    /// Endpoint rejected the envelope outright
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// Endpoint could not be reached
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
}

/// Guard errors
#[derive(Error, Debug)]
pub enum Error {
    /// A precondition query failed; the evaluation produced no decision
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Signing material is missing
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    /// Signing or dispatch failed
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// Confirmation not observed before the deadline
    #[error("Timed out waiting for {handle} (status: {status})")]
    Timeout {
        /// Handle being awaited; still valid
        handle: TransactionHandle,
        /// Last observed status
        status: ConfirmationStatus,
    },

    /// Caller cancelled the wait or evaluation
    #[error("Cancelled")]
    Cancelled,

    /// The account lacks a standing the operation requires, e.g. registration
    #[error("{operation} requires {requirement}: {reason}")]
    RequirementUnmet {
        /// Operation being evaluated
        operation: String,
        /// Requirement name
        requirement: &'static str,
        /// Human-readable reason
        reason: &'static str,
    },

    /// Operation or workflow name is not registered
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Caller parameters are missing or mistyped
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A registered spec is inconsistent
    #[error("Invalid precondition spec: {0}")]
    InvalidSpec(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A workflow stopped before its last step
    #[error(transparent)]
    WorkflowHalted(Box<crate::workflow::WorkflowHalted>),

    /// A check task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Query(QueryError::Unavailable { .. })
                | Error::Query(QueryError::DeadlineExceeded { .. })
                | Error::Submission(SubmissionError::Unreachable(_))
        )
    }
}

impl From<SigningError> for Error {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Unavailable => Error::SigningUnavailable(err.to_string()),
            SigningError::Unauthorized(reason) => {
                Error::Submission(SubmissionError::Unauthorized(reason))
            }
        }
    }
}
