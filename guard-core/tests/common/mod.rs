//! Hand-written fake capabilities shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use guard_core::{
    Capabilities, Check, ConfirmationStatus, EvalContext, Guard, Keystore, Observed, Operation,
    OperationDef, OperationRegistry, PreconditionSpec, QueryError, ReceiptReader, SignedEnvelope,
    StateKey, StateReader, StateValue, SubmissionError, Submitter, TransactionHandle,
    WorkflowTemplate,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Something the fake ledger observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Query(String),
    Submit(&'static str, TransactionHandle),
    Poll(TransactionHandle, ConfirmationStatus),
}

/// In-memory ledger with scripted receipts
#[derive(Default)]
pub struct FakeLedger {
    values: Mutex<HashMap<String, StateValue>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    receipt_script: Mutex<Vec<ConfirmationStatus>>,
    receipts: Mutex<HashMap<TransactionHandle, VecDeque<ConfirmationStatus>>>,
    events: Mutex<Vec<Event>>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        let ledger = Self::default();
        *ledger.receipt_script.lock() = vec![ConfirmationStatus::Included { block: 1 }];
        Arc::new(ledger)
    }

    pub fn set(&self, key: &str, value: impl Into<StateValue>) {
        self.values.lock().insert(key.to_string(), value.into());
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.delays.lock().insert(key.to_string(), delay);
    }

    /// Statuses every new submission reports, one per poll; the last repeats
    pub fn script_receipts(&self, script: Vec<ConfirmationStatus>) {
        *self.receipt_script.lock() = script;
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn submissions(&self) -> Vec<(&'static str, TransactionHandle)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Submit(op, handle) => Some((op, handle)),
                _ => None,
            })
            .collect()
    }

    pub fn polls(&self, handle: &TransactionHandle) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Poll(h, _) if h == handle))
            .count()
    }

    /// Position of the first event matching `pred`
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events().iter().position(pred)
    }
}

#[async_trait]
impl StateReader for FakeLedger {
    async fn query(&self, key: &StateKey) -> Result<StateValue, QueryError> {
        self.events.lock().push(Event::Query(key.to_string()));

        let delay = self.delays.lock().get(key.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(key.as_str()) {
            return Err(QueryError::Unavailable {
                key: key.clone(),
                reason: "connection refused".into(),
            });
        }

        self.values
            .lock()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| QueryError::UnknownKey(key.clone()))
    }
}

#[async_trait]
impl Submitter for FakeLedger {
    async fn submit(&self, envelope: SignedEnvelope) -> Result<TransactionHandle, SubmissionError> {
        envelope.verify()?;
        let handle = envelope
            .transaction_hash()
            .map_err(|e| SubmissionError::Rejected(e.to_string()))?;

        let script = self.receipt_script.lock().clone();
        self.receipts.lock().insert(handle, script.into());
        self.events
            .lock()
            .push(Event::Submit(envelope.operation.name(), handle));
        Ok(handle)
    }
}

#[async_trait]
impl ReceiptReader for FakeLedger {
    async fn status(&self, handle: &TransactionHandle) -> Result<ConfirmationStatus, QueryError> {
        let status = {
            let mut receipts = self.receipts.lock();
            let script = receipts
                .get_mut(handle)
                .ok_or_else(|| QueryError::UnknownKey(StateKey::new("tx").arg(handle)))?;
            if script.len() > 1 {
                script.pop_front().unwrap_or(ConfirmationStatus::Pending)
            } else {
                script.front().cloned().unwrap_or(ConfirmationStatus::Pending)
            }
        };
        self.events.lock().push(Event::Poll(*handle, status.clone()));
        Ok(status)
    }
}

pub const APPROVE: Operation = Operation::new("token.approve");
pub const JOIN: Operation = Operation::new("dao.join");
pub const STAKE: Operation = Operation::new("token.stake");

fn balance_keys(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("token.balance")])
}

fn insufficient_balance(ctx: &EvalContext, observed: &Observed) -> guard_core::Result<bool> {
    Ok(ctx.params.amount("amount")? > observed.amount(0)?)
}

fn member_keys(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("dao.member")])
}

fn is_set(_: &EvalContext, observed: &Observed) -> guard_core::Result<bool> {
    observed.bool(0)
}

fn registered_keys(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("node.registered")])
}

fn not_set(_: &EvalContext, observed: &Observed) -> guard_core::Result<bool> {
    Ok(!observed.bool(0)?)
}

pub fn test_registry() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry
        .register(OperationDef::new(PreconditionSpec::new(APPROVE).check(Check::new(
            "insufficient_balance",
            "The amount exceeds the token balance",
            balance_keys,
            insufficient_balance,
        ))))
        .unwrap();
    registry
        .register(OperationDef::new(PreconditionSpec::new(JOIN).check(Check::new(
            "already_member",
            "The node is already a member",
            member_keys,
            is_set,
        ))))
        .unwrap();
    registry
        .register(OperationDef::new(
            PreconditionSpec::new(STAKE)
                .require(Check::new(
                    "node_registered",
                    "The node is not registered",
                    registered_keys,
                    not_set,
                ))
                .check(Check::new(
                    "insufficient_balance",
                    "The amount exceeds the token balance",
                    balance_keys,
                    insufficient_balance,
                )),
        ))
        .unwrap();
    registry
        .register_workflow(WorkflowTemplate::new("dao.join").step(APPROVE).then(JOIN))
        .unwrap();
    registry
}

pub fn fast_config() -> guard_core::Config {
    let mut config = guard_core::Config::default();
    config.confirmation.poll_interval_ms = 100;
    config.confirmation.max_poll_interval_ms = 100;
    config.confirmation.backoff_multiplier = 1.0;
    config.confirmation.timeout_secs = 5;
    config
}

pub fn guard_with(ledger: &Arc<FakeLedger>, keystore: Keystore, config: guard_core::Config) -> Guard {
    let capabilities = Capabilities {
        reader: ledger.clone(),
        signer: Arc::new(keystore),
        submitter: ledger.clone(),
        receipts: ledger.clone(),
    };
    Guard::new(config, test_registry(), capabilities).unwrap()
}
