//! Confirmation Waiter
//!
//! Polls a handle's receipt with exponential backoff until it is terminal,
//! the deadline passes, or the caller cancels. A timed-out handle stays
//! valid and may be awaited again; nothing is ever resubmitted.

use crate::config::ConfirmationConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ports::ReceiptReader;
use crate::types::{ConfirmationStatus, TransactionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Poll interval schedule
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// First interval
    pub initial_interval: Duration,
    /// Upper bound
    pub max_interval: Duration,
    /// Growth per poll
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&ConfirmationConfig::default())
    }
}

impl From<&ConfirmationConfig> for PollPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.poll_interval_ms),
            max_interval: Duration::from_millis(config.max_poll_interval_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl PollPolicy {
    /// Fixed interval, no growth
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    /// Interval after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_interval)
    }
}

/// Waits for handles to become terminal
#[derive(Clone)]
pub struct ConfirmationWaiter {
    receipts: Arc<dyn ReceiptReader>,
    policy: PollPolicy,
    metrics: Option<Metrics>,
}

impl ConfirmationWaiter {
    /// New waiter
    pub fn new(receipts: Arc<dyn ReceiptReader>, policy: PollPolicy) -> Self {
        Self {
            receipts,
            policy,
            metrics: None,
        }
    }

    /// Record outcomes
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wait up to `timeout` for `handle` to be included or failed
    pub async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        timeout: Duration,
    ) -> Result<ConfirmationStatus> {
        self.await_cancellable(handle, timeout, &CancellationToken::new()).await
    }

    /// Wait, returning [`Error::Cancelled`] as soon as `cancel` fires
    pub async fn await_cancellable(
        &self,
        handle: &TransactionHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ConfirmationStatus> {
        let span = info_span!("await_confirmation", handle = %handle);
        let outcome = self.poll_until_terminal(handle, timeout, cancel).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            let label = match &outcome {
                Ok(status) => status.label(),
                Err(Error::Timeout { .. }) => "timeout",
                Err(Error::Cancelled) => "cancelled",
                Err(_) => "error",
            };
            metrics.record_wait(label);
        }
        outcome
    }

    async fn poll_until_terminal(
        &self,
        handle: &TransactionHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ConfirmationStatus> {
        let deadline = Instant::now() + timeout;
        let mut interval = self.policy.initial_interval;
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            polls += 1;
            match tokio::time::timeout_at(deadline, self.receipts.status(handle)).await {
                Ok(Ok(status)) if status.is_terminal() => {
                    info!("{} {} after {} poll(s)", handle, status, polls);
                    return Ok(status);
                }
                Ok(Ok(_)) => debug!(poll = polls, "{} still pending", handle),
                // Transient receipt errors do not end the wait
                Ok(Err(e)) => warn!("Receipt poll {} for {} failed: {}", polls, handle, e),
                Err(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Timed out waiting for {} after {} poll(s)", handle, polls);
                return Err(Error::Timeout {
                    handle: *handle,
                    status: ConfirmationStatus::Pending,
                });
            }

            let wait = interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
            interval = self.policy.next_interval(interval);
        }
    }
}

impl std::fmt::Debug for ConfirmationWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationWaiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
