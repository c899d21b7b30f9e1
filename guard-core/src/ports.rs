//! Injected capabilities
//!
//! The core never talks to a ledger directly. Every remote interaction goes
//! through one of these traits so that tests and the daemon can substitute
//! their own implementations.

use crate::error::{QueryError, SigningError, SubmissionError};
use crate::signing::SignedEnvelope;
use crate::types::{Address, ConfirmationStatus, Operation, Params, StateKey, StateValue, TransactionHandle};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only access to remote state
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Fetch one value
    async fn query(&self, key: &StateKey) -> Result<StateValue, QueryError>;
}

/// Caller-scoped signing material
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account the signer acts for. Fails when no credentials are loaded.
    fn account(&self) -> Result<Address, SigningError>;

    /// Produce a signed envelope for one operation
    async fn authorize(
        &self,
        operation: Operation,
        params: &Params,
    ) -> Result<SignedEnvelope, SigningError>;
}

/// Dispatch of signed envelopes
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Send the envelope; returns as soon as the endpoint accepts it
    async fn submit(&self, envelope: SignedEnvelope) -> Result<TransactionHandle, SubmissionError>;
}

/// Inclusion status lookup
#[async_trait]
pub trait ReceiptReader: Send + Sync {
    /// Current status of a handle
    async fn status(&self, handle: &TransactionHandle) -> Result<ConfirmationStatus, QueryError>;
}

/// The full set of capabilities a [`crate::Guard`] needs
#[derive(Clone)]
pub struct Capabilities {
    /// State reads
    pub reader: Arc<dyn StateReader>,
    /// Signing
    pub signer: Arc<dyn Signer>,
    /// Dispatch
    pub submitter: Arc<dyn Submitter>,
    /// Receipts
    pub receipts: Arc<dyn ReceiptReader>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
