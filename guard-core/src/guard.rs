//! Guard facade
//!
//! Binds the registry to a set of capabilities and exposes the two entry
//! points every operation gets: `can` (evaluate) and `execute` (sign and
//! submit), plus confirmation waits and workflow runs.

use crate::confirmation::{ConfirmationWaiter, PollPolicy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::executor::Executor;
use crate::metrics::Metrics;
use crate::ports::Capabilities;
use crate::precondition::EvalContext;
use crate::registry::{OperationDef, OperationRegistry};
use crate::types::{Address, ConfirmationStatus, EligibilityResult, Params, TransactionHandle};
use crate::workflow::{Sequencer, WorkflowStep};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a guarded submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Eligible and submitted
    Submitted {
        /// Evaluation that allowed the submission
        eligibility: EligibilityResult,
        /// Handle of the submission
        handle: TransactionHandle,
    },
    /// Not eligible; nothing was submitted
    Blocked(EligibilityResult),
}

/// Guarded access to the remote ledger
pub struct Guard {
    config: Config,
    registry: Arc<OperationRegistry>,
    capabilities: Capabilities,
    evaluator: Evaluator,
    executor: Executor,
    waiter: ConfirmationWaiter,
    metrics: Metrics,
}

impl Guard {
    /// Build a guard
    pub fn new(config: Config, registry: OperationRegistry, capabilities: Capabilities) -> Result<Self> {
        config.validate()?;
        let metrics = Metrics::new()?;

        let evaluator = Evaluator::new(Arc::clone(&capabilities.reader))
            .with_timeout(config.evaluation.timeout())
            .with_metrics(metrics.clone());
        let executor = Executor::new(
            Arc::clone(&capabilities.signer),
            Arc::clone(&capabilities.submitter),
        )
        .with_metrics(metrics.clone());
        let waiter = ConfirmationWaiter::new(
            Arc::clone(&capabilities.receipts),
            PollPolicy::from(&config.confirmation),
        )
        .with_metrics(metrics.clone());

        info!(
            "Guard ready: {} operation(s), {} workflow(s)",
            registry.operation_names().count(),
            registry.workflow_names().count()
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            capabilities,
            evaluator,
            executor,
            waiter,
            metrics,
        })
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered operations and workflows
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Signing account; fails before any query work when signing is unavailable
    pub fn account(&self) -> Result<Address> {
        Ok(self.capabilities.signer.account()?)
    }

    fn context(&self, params: &Params) -> Result<EvalContext> {
        Ok(EvalContext::new(self.account()?, params.clone()))
    }

    /// Evaluate the preconditions of `operation`
    pub async fn can(&self, operation: &str, params: &Params) -> Result<EligibilityResult> {
        self.can_cancellable(operation, params, &CancellationToken::new()).await
    }

    /// Evaluate, abandoning the checks when `cancel` fires
    pub async fn can_cancellable(
        &self,
        operation: &str,
        params: &Params,
        cancel: &CancellationToken,
    ) -> Result<EligibilityResult> {
        let def = self.registry.operation(operation)?;
        let ctx = self.context(params)?;
        self.evaluator.evaluate_cancellable(def.spec(), &ctx, cancel).await
    }

    /// Sign and submit `operation` without re-evaluating its checks.
    ///
    /// Requirements still gate the submission, like signer presence does.
    pub async fn execute(&self, operation: &str, params: &Params) -> Result<TransactionHandle> {
        let def = self.registry.operation(operation)?;
        let ctx = self.context(params)?;
        self.evaluator.require(def.spec(), &ctx).await?;
        let params = self.prepare(def, ctx).await?;
        self.executor.execute(def.operation(), &params).await
    }

    /// Evaluate, then submit only if eligible
    pub async fn submit_if_eligible(&self, operation: &str, params: &Params) -> Result<Outcome> {
        let eligibility = self.can(operation, params).await?;
        if !eligibility.eligible() {
            return Ok(Outcome::Blocked(eligibility));
        }
        let handle = self.execute(operation, params).await?;
        Ok(Outcome::Submitted { eligibility, handle })
    }

    /// Fill in derived parameters, then run the compose step
    async fn prepare(&self, def: &OperationDef, ctx: EvalContext) -> Result<Params> {
        let keys = def
            .derived()
            .iter()
            .map(|derived| (derived.key)(&ctx))
            .collect::<Result<Vec<_>>>()?;

        let reader = &self.capabilities.reader;
        let values = try_join_all(keys.iter().map(|key| reader.query(key))).await?;

        let mut params = ctx.params;
        // Derived values replace caller values of the same name
        for ((derived, key), value) in def.derived().iter().zip(&keys).zip(values) {
            if value.is_unset() {
                return Err(Error::InvalidParams(format!(
                    "{} for {} reads {}, which is not set",
                    derived.name,
                    def.operation(),
                    key
                )));
            }
            debug!("Derived {} for {}", derived.name, def.operation());
            params.insert(derived.name, value);
        }

        if let Some(compose) = def.composer() {
            compose(&mut params)?;
        }
        Ok(params)
    }

    /// Wait for `handle`; `None` uses the configured timeout
    pub async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        timeout: Option<Duration>,
    ) -> Result<ConfirmationStatus> {
        self.await_cancellable(handle, timeout, &CancellationToken::new()).await
    }

    /// Wait, returning early when `cancel` fires
    pub async fn await_cancellable(
        &self,
        handle: &TransactionHandle,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ConfirmationStatus> {
        let timeout = timeout.unwrap_or_else(|| self.config.confirmation.timeout());
        self.waiter.await_cancellable(handle, timeout, cancel).await
    }

    /// Steps of a registered workflow
    pub fn workflow_steps(&self, name: &str, params: &Params) -> Result<Vec<WorkflowStep>> {
        Ok(self.registry.workflow(name)?.instantiate(params))
    }

    /// Run a registered workflow
    pub async fn run_workflow(&self, name: &str, params: &Params) -> Result<Vec<TransactionHandle>> {
        let steps = self.workflow_steps(name, params)?;
        Sequencer::new(self)
            .run(name, &steps)
            .await
            .map_err(|halted| Error::WorkflowHalted(Box::new(halted)))
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("config", &self.config)
            .field("operations", &self.registry.operation_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
