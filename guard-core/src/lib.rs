//! Guarded Mutation Protocol
//!
//! Mutate state on a remote, append-only ledger only when a set of
//! independently verifiable preconditions holds.
//!
//! # Architecture
//!
//! - **Evaluator**: fans out one task per check, fails fast on any query error
//! - **Executor**: signs and submits, returns a handle without waiting
//! - **Confirmation Waiter**: polls receipts with backoff, cancellable
//! - **Sequencer**: multi-step workflows gated on confirmations
//!
//! Remote state, signing and dispatch are injected through the traits in
//! [`ports`], so every component runs against fakes in tests.
//!
//! # Invariants
//!
//! - `eligible == !(OR of all flags)` regardless of completion order
//! - A failed query never becomes a blocking flag
//! - Step i+1 of a workflow is never evaluated before step i is Included
//! - A timed-out handle is never resubmitted

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod confirmation;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod guard;
pub mod metrics;
pub mod ports;
pub mod precondition;
pub mod registry;
pub mod signing;
pub mod types;
pub mod workflow;

// Re-exports
pub use config::Config;
pub use confirmation::{ConfirmationWaiter, PollPolicy};
pub use error::{Error, QueryError, Result, SigningError, SubmissionError};
pub use evaluator::Evaluator;
pub use executor::Executor;
pub use guard::{Guard, Outcome};
pub use metrics::Metrics;
pub use ports::{Capabilities, ReceiptReader, Signer, StateReader, Submitter};
pub use precondition::{Check, EvalContext, Observed, PreconditionSpec};
pub use registry::{OperationDef, OperationRegistry, WorkflowTemplate};
pub use signing::{Keystore, SignedEnvelope};
pub use types::{
    Address, Amount, ConfirmationStatus, EligibilityResult, Flag, Operation, Params, StateKey,
    StateValue, TransactionHandle,
};
pub use workflow::{HaltReason, Sequencer, WorkflowHalted, WorkflowState, WorkflowStep};
