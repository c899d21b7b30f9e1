//! Single-writer ledger actor
//!
//! One task owns the chain state, the mempool and the receipt table. Every
//! read and write goes through a bounded mailbox, so handles can be cloned
//! freely across tasks.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Guard (Evaluator / Executor / Waiter tasks)  │
//! └──────────────────────┬────────────────────────┘
//!                        │ StateReader / Submitter / ReceiptReader
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │            LedgerHandle (Clone)               │
//! └──────────────────────┬────────────────────────┘
//!                        │ mpsc::channel (bounded)
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │          LedgerActor (single task)            │
//! │  state · mempool · receipts · fault plan      │
//! │  block timer or mine() → include mempool      │
//! └───────────────────────────────────────────────┘
//! ```

use crate::error::{Error, Result};
use crate::state::ChainState;
use crate::Config;
use async_trait::async_trait;
use guard_core::{
    ConfirmationStatus, QueryError, ReceiptReader, SignedEnvelope, StateKey, StateReader,
    StateValue, SubmissionError, Submitter, TransactionHandle,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// State transition applied when a transaction is included.
///
/// Runs against a scratch copy of the state; an error reverts the
/// transaction and becomes the receipt's failure reason.
pub type TransitionHook =
    Arc<dyn Fn(&SignedEnvelope, &mut ChainState) -> std::result::Result<(), String> + Send + Sync>;

type QueryReply = (std::result::Result<StateValue, QueryError>, Option<Duration>);

/// Snapshot of simulator counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerStats {
    /// Current block number
    pub block: u64,
    /// Transactions waiting for a block
    pub pending: usize,
    /// Accepted submissions
    pub submitted: usize,
    /// Included and applied
    pub included: usize,
    /// Included but reverted
    pub failed: usize,
}

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Read one key
    Query {
        key: StateKey,
        response: oneshot::Sender<QueryReply>,
    },

    /// Accept a signed envelope into the mempool
    Submit {
        envelope: SignedEnvelope,
        response: oneshot::Sender<std::result::Result<TransactionHandle, SubmissionError>>,
    },

    /// Receipt status
    Status {
        handle: TransactionHandle,
        response: oneshot::Sender<std::result::Result<ConfirmationStatus, QueryError>>,
    },

    /// Overwrite a value
    Set {
        key: StateKey,
        value: StateValue,
        response: oneshot::Sender<()>,
    },

    /// Produce one block now
    Mine { response: oneshot::Sender<u64> },

    /// Fail the next `count` queries of `key`
    FailQueries {
        key: StateKey,
        count: usize,
        response: oneshot::Sender<()>,
    },

    /// Delay every query of `key`
    DelayQueries {
        key: StateKey,
        delay: Duration,
        response: oneshot::Sender<()>,
    },

    /// Keep a transaction out of blocks
    Hold {
        handle: TransactionHandle,
        response: oneshot::Sender<()>,
    },

    /// Let a held transaction be included again
    Release {
        handle: TransactionHandle,
        response: oneshot::Sender<()>,
    },

    /// Counters
    Stats { response: oneshot::Sender<LedgerStats> },

    /// Shutdown actor
    Shutdown,
}

#[derive(Debug, Default)]
struct FaultPlan {
    failing: HashMap<StateKey, usize>,
    delays: HashMap<StateKey, Duration>,
    held: HashSet<TransactionHandle>,
}

/// Actor that owns the simulated chain
pub struct LedgerActor {
    mailbox: mpsc::Receiver<LedgerMessage>,
    state: ChainState,
    mempool: Vec<(TransactionHandle, SignedEnvelope)>,
    receipts: HashMap<TransactionHandle, ConfirmationStatus>,
    hooks: HashMap<String, TransitionHook>,
    faults: FaultPlan,
    block_time: Option<Duration>,
    seconds_per_block: u64,
    submitted: usize,
}

impl std::fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerActor")
            .field("block", &self.state.block())
            .field("pending", &self.mempool.len())
            .field("receipts", &self.receipts.len())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("faults", &self.faults)
            .field("block_time", &self.block_time)
            .finish_non_exhaustive()
    }
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        config: &Config,
        state: ChainState,
        hooks: HashMap<String, TransitionHook>,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            mailbox,
            state,
            mempool: Vec::new(),
            receipts: HashMap::new(),
            hooks,
            faults: FaultPlan::default(),
            block_time: (config.block_time_ms > 0).then(|| Duration::from_millis(config.block_time_ms)),
            seconds_per_block: config.seconds_per_block,
            submitted: 0,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let period = self.block_time.unwrap_or(Duration::from_secs(3600));
        let mut block_timer = interval_at(Instant::now() + period, period);
        block_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let timed = self.block_time.is_some();

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => {
                    match msg {
                        Some(LedgerMessage::Shutdown) | None => break,
                        Some(msg) => self.handle_message(msg),
                    }
                }

                _ = block_timer.tick(), if timed => {
                    self.mine();
                }
            }
        }

        debug!("Ledger actor stopped at block {}", self.state.block());
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Query { key, response } => {
                let _ = response.send(self.query(&key));
            }

            LedgerMessage::Submit { envelope, response } => {
                let _ = response.send(self.submit(envelope));
            }

            LedgerMessage::Status { handle, response } => {
                let result = self
                    .receipts
                    .get(&handle)
                    .cloned()
                    .ok_or_else(|| QueryError::UnknownKey(StateKey::new("chain.receipt").arg(handle)));
                let _ = response.send(result);
            }

            LedgerMessage::Set { key, value, response } => {
                self.state.set(key, value);
                let _ = response.send(());
            }

            LedgerMessage::Mine { response } => {
                let _ = response.send(self.mine());
            }

            LedgerMessage::FailQueries { key, count, response } => {
                self.faults.failing.insert(key, count);
                let _ = response.send(());
            }

            LedgerMessage::DelayQueries { key, delay, response } => {
                self.faults.delays.insert(key, delay);
                let _ = response.send(());
            }

            LedgerMessage::Hold { handle, response } => {
                self.faults.held.insert(handle);
                let _ = response.send(());
            }

            LedgerMessage::Release { handle, response } => {
                self.faults.held.remove(&handle);
                let _ = response.send(());
            }

            LedgerMessage::Stats { response } => {
                let _ = response.send(self.stats());
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn query(&mut self, key: &StateKey) -> QueryReply {
        let delay = self.faults.delays.get(key).copied();

        if let Some(remaining) = self.faults.failing.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return (
                    Err(QueryError::Unavailable {
                        key: key.clone(),
                        reason: "injected fault".to_string(),
                    }),
                    delay,
                );
            }
        }

        // Never-written storage answers like a contract getter would
        let value = self.state.get(key).unwrap_or(StateValue::Unset);
        (Ok(value), delay)
    }

    fn submit(&mut self, envelope: SignedEnvelope) -> std::result::Result<TransactionHandle, SubmissionError> {
        if let Err(e) = envelope.verify() {
            warn!("Rejected {} from {}: {}", envelope.operation, envelope.signer, e);
            return Err(e);
        }

        let handle = envelope
            .transaction_hash()
            .map_err(|e| SubmissionError::Rejected(e.to_string()))?;
        if self.receipts.contains_key(&handle) {
            warn!("Rejected duplicate transaction {}", handle);
            return Err(SubmissionError::Rejected(format!("known transaction {}", handle)));
        }

        debug!("Accepted {} as {}", envelope.operation, handle);
        self.receipts.insert(handle, ConfirmationStatus::Pending);
        self.mempool.push((handle, envelope));
        self.submitted += 1;
        Ok(handle)
    }

    /// Include every non-held pending transaction in a new block
    fn mine(&mut self) -> u64 {
        self.state.advance(self.seconds_per_block);
        let block = self.state.block();

        let (held, ready): (Vec<_>, Vec<_>) = std::mem::take(&mut self.mempool)
            .into_iter()
            .partition(|(handle, _)| self.faults.held.contains(handle));
        self.mempool = held;

        let included = ready.len();
        for (handle, envelope) in ready {
            let status = self.apply(&envelope, block);
            self.settle(handle, status);
        }

        if included > 0 {
            info!("Mined block {} with {} transaction(s)", block, included);
        } else {
            debug!("Mined empty block {}", block);
        }
        block
    }

    fn apply(&mut self, envelope: &SignedEnvelope, block: u64) -> ConfirmationStatus {
        let Some(hook) = self.hooks.get(envelope.operation.name()) else {
            return ConfirmationStatus::Included { block };
        };

        let mut scratch = self.state.clone();
        match hook(envelope, &mut scratch) {
            Ok(()) => {
                self.state = scratch;
                ConfirmationStatus::Included { block }
            }
            Err(reason) => {
                warn!("{} reverted in block {}: {}", envelope.operation, block, reason);
                ConfirmationStatus::Failed { reason }
            }
        }
    }

    /// Record a terminal status; terminal receipts never change again
    fn settle(&mut self, handle: TransactionHandle, status: ConfirmationStatus) {
        let entry = self.receipts.entry(handle).or_insert(ConfirmationStatus::Pending);
        if !entry.is_terminal() {
            *entry = status;
        }
    }

    fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats {
            block: self.state.block(),
            pending: self.mempool.len(),
            submitted: self.submitted,
            ..Default::default()
        };
        for status in self.receipts.values() {
            match status {
                ConfirmationStatus::Included { .. } => stats.included += 1,
                ConfirmationStatus::Failed { .. } => stats.failed += 1,
                ConfirmationStatus::Pending => {}
            }
        }
        stats
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::mailbox_closed())?;
        rx.await.map_err(|_| Error::response_dropped())
    }

    /// Overwrite a value
    pub async fn set(&self, key: StateKey, value: impl Into<StateValue>) -> Result<()> {
        let value = value.into();
        self.request(|response| LedgerMessage::Set { key, value, response }).await
    }

    /// Read a stored value, ignoring injected delays; `None` if never written
    pub async fn get(&self, key: StateKey) -> Result<Option<StateValue>> {
        let (result, _) = self
            .request(|response| LedgerMessage::Query { key, response })
            .await?;
        Ok(result.ok().filter(|value| !value.is_unset()))
    }

    /// Produce one block; returns its number
    pub async fn mine(&self) -> Result<u64> {
        self.request(|response| LedgerMessage::Mine { response }).await
    }

    /// Fail the next `count` queries of `key`
    pub async fn fail_queries(&self, key: StateKey, count: usize) -> Result<()> {
        self.request(|response| LedgerMessage::FailQueries { key, count, response })
            .await
    }

    /// Delay every query of `key`
    pub async fn delay_queries(&self, key: StateKey, delay: Duration) -> Result<()> {
        self.request(|response| LedgerMessage::DelayQueries { key, delay, response })
            .await
    }

    /// Keep `handle` pending until released
    pub async fn hold(&self, handle: TransactionHandle) -> Result<()> {
        self.request(|response| LedgerMessage::Hold { handle, response }).await
    }

    /// Allow `handle` into the next block
    pub async fn release(&self, handle: TransactionHandle) -> Result<()> {
        self.request(|response| LedgerMessage::Release { handle, response }).await
    }

    /// Counters
    pub async fn stats(&self) -> Result<LedgerStats> {
        self.request(|response| LedgerMessage::Stats { response }).await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::mailbox_closed())?;
        Ok(())
    }
}

#[async_trait]
impl StateReader for LedgerHandle {
    async fn query(&self, key: &StateKey) -> std::result::Result<StateValue, QueryError> {
        let owned = key.clone();
        let (result, delay) = self
            .request(|response| LedgerMessage::Query { key: owned, response })
            .await
            .map_err(|e| QueryError::Unavailable {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        // Round-trip latency is simulated outside the actor
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[async_trait]
impl Submitter for LedgerHandle {
    async fn submit(&self, envelope: SignedEnvelope) -> std::result::Result<TransactionHandle, SubmissionError> {
        self.request(|response| LedgerMessage::Submit { envelope, response })
            .await
            .map_err(|e| SubmissionError::Unreachable(e.to_string()))?
    }
}

#[async_trait]
impl ReceiptReader for LedgerHandle {
    async fn status(&self, handle: &TransactionHandle) -> std::result::Result<ConfirmationStatus, QueryError> {
        let handle = *handle;
        self.request(|response| LedgerMessage::Status { handle, response })
            .await
            .map_err(|e| QueryError::Unavailable {
                key: StateKey::new("chain.receipt").arg(handle),
                reason: e.to_string(),
            })?
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    config: &Config,
    state: ChainState,
    hooks: HashMap<String, TransitionHook>,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
    let actor = LedgerActor::new(config, state, hooks, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

/// Builder for a simulated ledger
#[derive(Default)]
pub struct LedgerBuilder {
    config: Config,
    genesis: crate::Genesis,
    hooks: HashMap<String, TransitionHook>,
}

impl LedgerBuilder {
    /// Builder with `config`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Seed state
    pub fn genesis(mut self, genesis: crate::Genesis) -> Self {
        self.genesis = genesis;
        self
    }

    /// Run `hook` whenever an `operation` transaction is included
    pub fn hook<F>(mut self, operation: &str, hook: F) -> Self
    where
        F: Fn(&SignedEnvelope, &mut ChainState) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.insert(operation.to_string(), Arc::new(hook));
        self
    }

    /// Register several hooks at once
    pub fn hooks(mut self, hooks: impl IntoIterator<Item = (String, TransitionHook)>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Start the actor
    pub fn spawn(self) -> LedgerHandle {
        let state = self.genesis.into_state(&self.config);
        info!(
            "Starting simulated ledger at block {} with {} key(s)",
            state.block(),
            state.len()
        );
        spawn_ledger_actor(&self.config, state, self.hooks)
    }
}

impl std::fmt::Debug for LedgerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerBuilder")
            .field("config", &self.config)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Genesis;
    use guard_core::{Amount, Keystore, Operation, Params, Signer};

    fn balance_key() -> StateKey {
        StateKey::new("token.balance")
    }

    fn spawn() -> LedgerHandle {
        LedgerBuilder::new(Config::default())
            .genesis(Genesis::new().with(balance_key(), Amount::from_wei(100)))
            .hook("token.burn", |envelope, state| {
                let amount = envelope.params.amount("amount").map_err(|e| e.to_string())?;
                state.debit(&StateKey::new("token.balance"), amount)
            })
            .spawn()
    }

    async fn envelope(keystore: &Keystore, wei: u128) -> SignedEnvelope {
        keystore
            .authorize(
                Operation::new("token.burn"),
                &Params::new().with("amount", Amount::from_wei(wei)),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_actor_and_messages_debug() {
        let (_tx, rx) = mpsc::channel(1);
        let actor = LedgerActor::new(&Config::default(), ChainState::new(1, 0), HashMap::new(), rx);
        let rendered = format!("{:?}", actor);
        assert!(rendered.starts_with("LedgerActor"), "{}", rendered);
        assert!(rendered.contains("block: 1"), "{}", rendered);
        assert!(rendered.contains("pending: 0"), "{}", rendered);

        let (response, _rx) = oneshot::channel();
        let message = LedgerMessage::Set {
            key: balance_key(),
            value: StateValue::Bool(true),
            response,
        };
        assert!(format!("{:?}", message).starts_with("Set"));
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let handle = spawn();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_and_chain_keys() {
        let handle = spawn();

        assert_eq!(
            handle.query(&balance_key()).await.unwrap(),
            StateValue::Amount(Amount::from_wei(100))
        );
        assert_eq!(
            handle.query(&StateKey::block_number()).await.unwrap(),
            StateValue::Uint(1)
        );
        assert_eq!(handle.query(&StateKey::new("missing")).await.unwrap(), StateValue::Unset);
        assert_eq!(handle.get(StateKey::new("missing")).await.unwrap(), None);

        handle.mine().await.unwrap();
        assert_eq!(
            handle.query(&StateKey::timestamp()).await.unwrap(),
            StateValue::Uint(1_700_000_012)
        );
    }

    #[tokio::test]
    async fn test_submit_mine_and_receipt() {
        let handle = spawn();
        let keystore = Keystore::from_seed(&[1u8; 32]);

        let tx = handle.submit(envelope(&keystore, 40).await).await.unwrap();
        assert_eq!(handle.status(&tx).await.unwrap(), ConfirmationStatus::Pending);

        let block = handle.mine().await.unwrap();
        assert_eq!(handle.status(&tx).await.unwrap(), ConfirmationStatus::Included { block });
        assert_eq!(
            handle.get(balance_key()).await.unwrap(),
            Some(StateValue::Amount(Amount::from_wei(60)))
        );
    }

    #[tokio::test]
    async fn test_hook_error_fails_receipt_and_reverts() {
        let handle = spawn();
        let keystore = Keystore::from_seed(&[1u8; 32]);

        let tx = handle.submit(envelope(&keystore, 500).await).await.unwrap();
        handle.mine().await.unwrap();

        assert!(matches!(
            handle.status(&tx).await.unwrap(),
            ConfirmationStatus::Failed { .. }
        ));
        assert_eq!(
            handle.get(balance_key()).await.unwrap(),
            Some(StateValue::Amount(Amount::from_wei(100)))
        );

        // Terminal receipts are never revisited
        handle.mine().await.unwrap();
        assert!(matches!(
            handle.status(&tx).await.unwrap(),
            ConfirmationStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_rejects_duplicates_and_bad_signatures() {
        let handle = spawn();
        let keystore = Keystore::from_seed(&[1u8; 32]);
        let signed = envelope(&keystore, 1).await;

        handle.submit(signed.clone()).await.unwrap();
        assert!(matches!(
            handle.submit(signed.clone()).await,
            Err(SubmissionError::Rejected(_))
        ));

        let mut tampered = signed;
        tampered.issued_at += 1;
        assert!(matches!(
            handle.submit(tampered).await,
            Err(SubmissionError::Rejected(_))
        ));

        assert_eq!(handle.stats().await.unwrap().submitted, 1);
    }

    #[tokio::test]
    async fn test_injected_query_failures() {
        let handle = spawn();
        handle.fail_queries(balance_key(), 2).await.unwrap();

        assert!(handle.query(&balance_key()).await.is_err());
        assert!(handle.query(&balance_key()).await.is_err());
        assert!(handle.query(&balance_key()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_delay() {
        let handle = spawn();
        handle
            .delay_queries(balance_key(), Duration::from_secs(2))
            .await
            .unwrap();

        let started = Instant::now();
        handle.query(&balance_key()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_held_receipt_stays_pending() {
        let handle = spawn();
        let keystore = Keystore::from_seed(&[1u8; 32]);
        let tx = handle.submit(envelope(&keystore, 1).await).await.unwrap();

        handle.hold(tx).await.unwrap();
        handle.mine().await.unwrap();
        handle.mine().await.unwrap();
        assert_eq!(handle.status(&tx).await.unwrap(), ConfirmationStatus::Pending);

        handle.release(tx).await.unwrap();
        handle.mine().await.unwrap();
        assert!(handle.status(&tx).await.unwrap().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_timer_mines() {
        let config = Config {
            block_time_ms: 1_000,
            ..Config::default()
        };
        let handle = LedgerBuilder::new(config).spawn();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(handle.stats().await.unwrap().block, 4);
    }
}
