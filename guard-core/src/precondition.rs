//! Precondition specs
//!
//! A [`PreconditionSpec`] is a set of independent named checks for one
//! operation. Each check names the state keys it reads and a predicate that
//! turns the observed values into a blocking flag.
//!
//! Requirements use the same [`Check`] shape but gate the whole evaluation:
//! they run before any check, and a blocking requirement is an
//! [`Error::RequirementUnmet`] instead of a flag.

use crate::error::{Error, QueryError, Result};
use crate::types::{Address, Amount, Operation, Params, StateKey, StateValue};
use std::collections::HashSet;
use std::fmt;

/// Keys one check reads
pub type KeysFn = fn(&EvalContext) -> Result<Vec<StateKey>>;

/// Returns true when the observed state blocks the operation
pub type PredicateFn = fn(&EvalContext, &Observed) -> Result<bool>;

/// Per-invocation input to every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalContext {
    /// Account the operation would be signed by
    pub account: Address,
    /// Caller parameters
    pub params: Params,
}

impl EvalContext {
    /// New context
    pub fn new(account: Address, params: Params) -> Self {
        Self { account, params }
    }
}

/// Values fetched for one check, in the order its keys were declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    entries: Vec<(StateKey, StateValue)>,
}

impl Observed {
    /// Pair keys with their values
    pub fn new(entries: Vec<(StateKey, StateValue)>) -> Self {
        Self { entries }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the check read nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value at `index`
    pub fn value(&self, index: usize) -> Result<&StateValue> {
        self.entries.get(index).map(|(_, v)| v).ok_or_else(|| {
            Error::InvalidSpec(format!(
                "check read value #{} but only {} keys were queried",
                index,
                self.entries.len()
            ))
        })
    }

    fn typed<'a, T>(
        &'a self,
        index: usize,
        expected: &'static str,
        extract: impl FnOnce(&'a StateValue) -> Option<T>,
    ) -> Result<T> {
        let value = self.value(index)?;
        extract(value).ok_or_else(|| {
            Error::Query(QueryError::Malformed {
                key: self.entries[index].0.clone(),
                expected,
                found: value.kind(),
            })
        })
    }

    /// Bool at `index`
    pub fn bool(&self, index: usize) -> Result<bool> {
        self.typed(index, "bool", StateValue::as_bool)
    }

    /// Uint at `index`
    pub fn uint(&self, index: usize) -> Result<u64> {
        self.typed(index, "uint", StateValue::as_uint)
    }

    /// Amount at `index`
    pub fn amount(&self, index: usize) -> Result<Amount> {
        self.typed(index, "amount", StateValue::as_amount)
    }

    /// Address at `index`
    pub fn address(&self, index: usize) -> Result<Address> {
        self.typed(index, "address", StateValue::as_address)
    }

    /// Text at `index`
    pub fn text(&self, index: usize) -> Result<&str> {
        self.typed(index, "text", StateValue::as_text)
    }
}

/// One named check
#[derive(Clone, Copy)]
pub struct Check {
    /// Flag name in the eligibility result
    pub name: &'static str,
    /// Human-readable reason shown when blocking
    pub reason: &'static str,
    keys: KeysFn,
    predicate: PredicateFn,
}

impl Check {
    /// Define a check
    pub const fn new(name: &'static str, reason: &'static str, keys: KeysFn, predicate: PredicateFn) -> Self {
        Self {
            name,
            reason,
            keys,
            predicate,
        }
    }

    /// Keys this check reads for `ctx`
    pub fn keys(&self, ctx: &EvalContext) -> Result<Vec<StateKey>> {
        (self.keys)(ctx)
    }

    /// Apply the predicate
    pub fn is_blocking(&self, ctx: &EvalContext, observed: &Observed) -> Result<bool> {
        (self.predicate)(ctx, observed)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// All checks guarding one operation
#[derive(Debug, Clone)]
pub struct PreconditionSpec {
    operation: Operation,
    requirements: Vec<Check>,
    checks: Vec<Check>,
}

impl PreconditionSpec {
    /// Spec with no checks
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            requirements: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Gate every evaluation on `requirement`
    pub fn require(mut self, requirement: Check) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Add a check
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Add every requirement and check of another spec
    pub fn extend_from(mut self, other: &PreconditionSpec) -> Self {
        self.requirements.extend(other.requirements.iter().copied());
        self.checks.extend(other.checks.iter().copied());
        self
    }

    /// Guarded operation
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Requirements in declaration order
    pub fn requirements(&self) -> &[Check] {
        &self.requirements
    }

    /// Checks in declaration order
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Reject duplicate check names
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for check in self.requirements.iter().chain(&self.checks) {
            if !seen.insert(check.name) {
                return Err(Error::InvalidSpec(format!(
                    "{} declares check '{}' twice",
                    self.operation, check.name
                )));
            }
        }
        Ok(())
    }
}
