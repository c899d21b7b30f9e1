//! Mutation Executor
//!
//! Signs and dispatches one operation. It does not re-check eligibility and
//! returns as soon as the endpoint accepts the envelope; later on-chain
//! rejection is only visible through the confirmation waiter.

use crate::error::Result;
use crate::metrics::Metrics;
use crate::ports::{Signer, Submitter};
use crate::types::{Operation, Params, TransactionHandle};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Signs and submits mutations
#[derive(Clone)]
pub struct Executor {
    signer: Arc<dyn Signer>,
    submitter: Arc<dyn Submitter>,
    metrics: Option<Metrics>,
}

impl Executor {
    /// New executor
    pub fn new(signer: Arc<dyn Signer>, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            signer,
            submitter,
            metrics: None,
        }
    }

    /// Record outcomes
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sign and submit `operation` with `params`
    pub async fn execute(&self, operation: Operation, params: &Params) -> Result<TransactionHandle> {
        let span = info_span!("execute", operation = %operation);
        let outcome = self.sign_and_submit(operation, params).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            let label = if outcome.is_ok() { "submitted" } else { "error" };
            metrics.record_submission(operation.name(), label);
        }

        match &outcome {
            Ok(handle) => info!("Submitted {}: {}", operation, handle),
            Err(e) => warn!("Could not submit {}: {}", operation, e),
        }
        outcome
    }

    async fn sign_and_submit(&self, operation: Operation, params: &Params) -> Result<TransactionHandle> {
        let envelope = self.signer.authorize(operation, params).await?;
        Ok(self.submitter.submit(envelope).await?)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}
