//! Chain state owned by the ledger actor
//!
//! Like contract storage, a key that was never written reads as the zero
//! value of whatever kind the reader asks for.

use guard_core::types::{BLOCK_NUMBER_KEY, TIMESTAMP_KEY};
use guard_core::{Address, Amount, StateKey, StateValue};
use std::collections::HashMap;

/// Key/value state plus the chain clock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    values: HashMap<StateKey, StateValue>,
    block: u64,
    timestamp: u64,
}

impl ChainState {
    /// Empty state at the given clock
    pub fn new(block: u64, timestamp: u64) -> Self {
        Self {
            values: HashMap::new(),
            block,
            timestamp,
        }
    }

    /// Current block number
    pub fn block(&self) -> u64 {
        self.block
    }

    /// Current chain timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub(crate) fn advance(&mut self, seconds: u64) {
        self.block += 1;
        self.timestamp += seconds;
    }

    /// Read a value; chain keys come from the clock
    pub fn get(&self, key: &StateKey) -> Option<StateValue> {
        match key.as_str() {
            BLOCK_NUMBER_KEY => Some(StateValue::Uint(self.block)),
            TIMESTAMP_KEY => Some(StateValue::Uint(self.timestamp)),
            _ => self.values.get(key).cloned(),
        }
    }

    /// Write a value
    pub fn set(&mut self, key: StateKey, value: impl Into<StateValue>) {
        self.values.insert(key, value.into());
    }

    /// Number of stored keys (chain keys excluded)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `key`, unset if never written
    fn slot(&self, key: &StateKey) -> StateValue {
        self.get(key).unwrap_or(StateValue::Unset)
    }

    /// Bool at `key`; missing means false
    pub fn bool(&self, key: &StateKey) -> Result<bool, String> {
        self.slot(key)
            .as_bool()
            .ok_or_else(|| format!("{} is not a bool", key))
    }

    /// Uint at `key`; missing means zero
    pub fn uint(&self, key: &StateKey) -> Result<u64, String> {
        self.slot(key)
            .as_uint()
            .ok_or_else(|| format!("{} is not a uint", key))
    }

    /// Amount at `key`; missing means zero
    pub fn amount(&self, key: &StateKey) -> Result<Amount, String> {
        self.slot(key)
            .as_amount()
            .ok_or_else(|| format!("{} is not an amount", key))
    }

    /// Address at `key`; missing means the zero address
    pub fn address(&self, key: &StateKey) -> Result<Address, String> {
        self.slot(key)
            .as_address()
            .ok_or_else(|| format!("{} is not an address", key))
    }

    /// Subtract from a balance, reverting on underflow
    pub fn debit(&mut self, key: &StateKey, amount: Amount) -> Result<(), String> {
        let balance = self.amount(key)?;
        let remaining = balance
            .checked_sub(amount)
            .ok_or_else(|| format!("insufficient balance at {}: {} < {}", key, balance, amount))?;
        self.set(key.clone(), remaining);
        Ok(())
    }

    /// Add to a balance
    pub fn credit(&mut self, key: &StateKey, amount: Amount) -> Result<(), String> {
        let balance = self.amount(key)?;
        let total = balance
            .checked_add(amount)
            .ok_or_else(|| format!("balance overflow at {}", key))?;
        self.set(key.clone(), total);
        Ok(())
    }
}
