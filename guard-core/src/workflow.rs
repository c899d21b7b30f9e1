//! Workflow Sequencer
//!
//! Runs an ordered list of steps as evaluate → execute → await → next.
//! A step that depends on its predecessor is only evaluated once the
//! predecessor's handle is Included. Any blocked evaluation, error, or failed
//! confirmation halts the workflow; earlier steps stay committed.

use crate::error::Error;
use crate::guard::Guard;
use crate::types::{ConfirmationStatus, EligibilityResult, Operation, Params, TransactionHandle};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

/// One step of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    /// Operation to run
    pub operation: Operation,
    /// Caller parameters
    pub params: Params,
    /// Wait for the previous step's handle to be Included first
    pub depends_on_previous: bool,
}

impl WorkflowStep {
    /// Independent step
    pub fn new(operation: Operation, params: Params) -> Self {
        Self {
            operation,
            params,
            depends_on_previous: false,
        }
    }

    /// Mark as depending on the previous step
    pub fn after_previous(mut self) -> Self {
        self.depends_on_previous = true;
        self
    }
}

/// Sequencer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// Nothing run yet
    NotStarted,
    /// Evaluating step i
    Evaluating(usize),
    /// Submitting step i
    Executing(usize),
    /// Waiting for step i's confirmation
    Awaiting(usize),
    /// All steps done
    Completed,
    /// Stopped at step i
    Halted(usize),
}

/// Why a workflow stopped
#[derive(Debug)]
pub enum HaltReason {
    /// Step evaluated as not eligible
    Blocked(EligibilityResult),
    /// Step was included but failed on chain
    Failed {
        /// Failed handle
        handle: TransactionHandle,
        /// Revert reason
        reason: String,
    },
    /// Evaluation, submission or wait error
    Error(Error),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Blocked(result) => {
                write!(f, "{} blocked: {}", result.operation(), result.blocking_reasons().join("; "))
            }
            HaltReason::Failed { handle, reason } => write!(f, "{} failed: {}", handle, reason),
            HaltReason::Error(e) => write!(f, "{}", e),
        }
    }
}

/// A workflow stopped before finishing
#[derive(Debug, thiserror::Error)]
#[error("Workflow halted at step {step} ({operation}) after {completed} completed step(s): {reason}")]
pub struct WorkflowHalted {
    /// Index of the step that halted
    pub step: usize,
    /// Operation of that step
    pub operation: Operation,
    /// Steps observed as Included before the halt. A submitted step that
    /// nothing waited on is in `handles` but not counted here.
    pub completed: usize,
    /// Handles of every submitted step, retained for the caller
    pub handles: Vec<TransactionHandle>,
    /// Cause
    pub reason: HaltReason,
}

type Observer<'g> = Box<dyn Fn(WorkflowState) + Send + Sync + 'g>;

/// Runs workflows against one [`Guard`]
pub struct Sequencer<'g> {
    guard: &'g Guard,
    cancel: CancellationToken,
    observer: Option<Observer<'g>>,
}

impl<'g> Sequencer<'g> {
    /// Sequencer over `guard`
    pub fn new(guard: &'g Guard) -> Self {
        Self {
            guard,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    /// Abort evaluation and waits when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called on every state transition
    pub fn on_transition(mut self, observer: impl Fn(WorkflowState) + Send + Sync + 'g) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn enter(&self, state: WorkflowState) {
        debug!("Workflow state: {:?}", state);
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    /// Run `steps` in order
    pub async fn run(
        &self,
        name: &str,
        steps: &[WorkflowStep],
    ) -> Result<Vec<TransactionHandle>, WorkflowHalted> {
        let span = info_span!("workflow", workflow = name, steps = steps.len());
        let outcome = self.run_steps(steps).instrument(span).await;

        let label = match &outcome {
            Ok(handles) => {
                info!("Workflow {} completed with {} transaction(s)", name, handles.len());
                "completed"
            }
            Err(halted) => {
                error!("Workflow {}: {}", name, halted);
                "halted"
            }
        };
        self.guard.metrics().record_workflow(name, label);
        outcome
    }

    async fn run_steps(&self, steps: &[WorkflowStep]) -> Result<Vec<TransactionHandle>, WorkflowHalted> {
        let mut handles: Vec<TransactionHandle> = Vec::with_capacity(steps.len());
        let mut confirmed = 0;
        self.enter(WorkflowState::NotStarted);

        let halt = |step: usize, completed: usize, handles: Vec<TransactionHandle>, reason: HaltReason| {
            self.enter(WorkflowState::Halted(step));
            WorkflowHalted {
                step,
                operation: steps[step].operation,
                completed,
                handles,
                reason,
            }
        };

        for (index, step) in steps.iter().enumerate() {
            if step.depends_on_previous {
                if let Some(previous) = handles.last().copied() {
                    self.enter(WorkflowState::Awaiting(index - 1));
                    if let Err(reason) = self.confirm(&previous).await {
                        return Err(halt(index - 1, confirmed, handles, reason));
                    }
                    confirmed += 1;
                }
            }

            self.enter(WorkflowState::Evaluating(index));
            match self
                .guard
                .can_cancellable(step.operation.name(), &step.params, &self.cancel)
                .await
            {
                Ok(result) if result.eligible() => {}
                Ok(result) => return Err(halt(index, confirmed, handles, HaltReason::Blocked(result))),
                Err(e) => return Err(halt(index, confirmed, handles, HaltReason::Error(e))),
            }

            self.enter(WorkflowState::Executing(index));
            match self.guard.execute(step.operation.name(), &step.params).await {
                Ok(handle) => handles.push(handle),
                Err(e) => return Err(halt(index, confirmed, handles, HaltReason::Error(e))),
            }
        }

        if self.guard.config().workflow.await_final_step {
            if let Some(last) = handles.last().copied() {
                let index = handles.len() - 1;
                self.enter(WorkflowState::Awaiting(index));
                if let Err(reason) = self.confirm(&last).await {
                    return Err(halt(index, confirmed, handles, reason));
                }
            }
        }

        self.enter(WorkflowState::Completed);
        Ok(handles)
    }

    async fn confirm(&self, handle: &TransactionHandle) -> Result<(), HaltReason> {
        match self.guard.await_cancellable(handle, None, &self.cancel).await {
            Ok(ConfirmationStatus::Included { .. }) => Ok(()),
            Ok(ConfirmationStatus::Failed { reason }) => Err(HaltReason::Failed {
                handle: *handle,
                reason,
            }),
            Ok(ConfirmationStatus::Pending) => Err(HaltReason::Error(Error::Timeout {
                handle: *handle,
                status: ConfirmationStatus::Pending,
            })),
            Err(e) => Err(HaltReason::Error(e)),
        }
    }
}

impl fmt::Debug for Sequencer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer").finish_non_exhaustive()
    }
}
