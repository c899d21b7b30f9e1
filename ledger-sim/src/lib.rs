//! # Simulated Ledger
//!
//! In-process key/value ledger implementing the guard's state, submission
//! and receipt ports. Used by the daemon's local mode and by tests.
//!
//! ## Features
//!
//! - Single-writer actor with a bounded mailbox
//! - Manual (`mine()`) or timed block production
//! - Per-operation transition hooks with revert on error
//! - Fault injection: failing keys, slow keys, held transactions

#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod actor;
pub mod config;
pub mod error;
pub mod genesis;
pub mod state;

pub use actor::{LedgerBuilder, LedgerHandle, LedgerStats, TransitionHook};
pub use config::Config;
pub use error::{Error, Result};
pub use genesis::{Genesis, GenesisEntry};
pub use state::ChainState;
