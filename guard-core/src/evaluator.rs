//! Precondition Evaluator
//!
//! Runs every check of a [`PreconditionSpec`] as its own task and folds the
//! flags into one [`EligibilityResult`].
//!
//! # Guarantees
//!
//! - **Fail fast**: the first query or predicate error aborts the remaining
//!   tasks and is returned; no partial result is ever produced
//! - **Order independence**: flags are placed by declaration index, so the
//!   completion order of the tasks never changes the result
//! - **Cancellation**: a cancelled token or elapsed deadline abandons the
//!   in-flight checks and returns an error
//! - **Requirements first**: no check runs until every requirement holds

use crate::error::{Error, QueryError, Result};
use crate::metrics::Metrics;
use crate::ports::StateReader;
use crate::precondition::{Check, EvalContext, Observed, PreconditionSpec};
use crate::types::{EligibilityResult, Flag};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Concurrent precondition evaluator
#[derive(Clone)]
pub struct Evaluator {
    reader: Arc<dyn StateReader>,
    timeout: Option<Duration>,
    metrics: Option<Metrics>,
}

impl Evaluator {
    /// Evaluator without a deadline
    pub fn new(reader: Arc<dyn StateReader>) -> Self {
        Self {
            reader,
            timeout: None,
            metrics: None,
        }
    }

    /// Bound the whole evaluation
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record outcomes
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Evaluate every check of `spec` for `ctx`
    pub async fn evaluate(&self, spec: &PreconditionSpec, ctx: &EvalContext) -> Result<EligibilityResult> {
        self.evaluate_cancellable(spec, ctx, &CancellationToken::new()).await
    }

    /// Evaluate, abandoning the checks as soon as `cancel` fires
    pub async fn evaluate_cancellable(
        &self,
        spec: &PreconditionSpec,
        ctx: &EvalContext,
        cancel: &CancellationToken,
    ) -> Result<EligibilityResult> {
        let operation = spec.operation();
        let span = info_span!("evaluate", operation = %operation, checks = spec.checks().len());
        let started = Instant::now();

        let outcome = async {
            let collect = async {
                self.require(spec, ctx).await?;
                self.run_checks(spec, ctx).await
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = with_deadline(self.timeout, collect) => result,
            }
        }
        .instrument(span)
        .await;

        let label = match &outcome {
            Ok(result) if result.eligible() => "eligible",
            Ok(_) => "blocked",
            Err(Error::RequirementUnmet { .. }) => "unmet",
            Err(_) => "error",
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(operation.name(), label, started.elapsed().as_secs_f64());
        }

        match &outcome {
            Ok(result) if result.eligible() => info!("{} is eligible", operation),
            Ok(result) => warn!(
                "{} is blocked: {}",
                operation,
                result.blocking_reasons().join("; ")
            ),
            Err(e) => warn!("Evaluation of {} failed: {}", operation, e),
        }

        outcome
    }

    /// Fail with [`Error::RequirementUnmet`] unless every requirement holds
    pub async fn require(&self, spec: &PreconditionSpec, ctx: &EvalContext) -> Result<()> {
        if spec.requirements().is_empty() {
            return Ok(());
        }

        let ctx = Arc::new(ctx.clone());
        let gates = spec.requirements().iter().copied().map(|check| {
            let reader = Arc::clone(&self.reader);
            let ctx = Arc::clone(&ctx);
            async move { run_check(reader, check, ctx).await.map(|blocking| (check, blocking)) }
        });

        match try_join_all(gates).await?.into_iter().find(|(_, blocking)| *blocking) {
            Some((check, _)) => Err(Error::RequirementUnmet {
                operation: spec.operation().to_string(),
                requirement: check.name,
                reason: check.reason,
            }),
            None => Ok(()),
        }
    }

    async fn run_checks(&self, spec: &PreconditionSpec, ctx: &EvalContext) -> Result<EligibilityResult> {
        let ctx = Arc::new(ctx.clone());
        let mut tasks = JoinSet::new();

        for (index, check) in spec.checks().iter().copied().enumerate() {
            let reader = Arc::clone(&self.reader);
            let ctx = Arc::clone(&ctx);
            tasks.spawn(
                async move { run_check(reader, check, ctx).await.map(|blocking| (index, blocking)) }
                    .in_current_span(),
            );
        }

        let mut flags: Vec<Option<bool>> = vec![None; spec.checks().len()];

        // Dropping the JoinSet on early return aborts the remaining checks
        while let Some(joined) = tasks.join_next().await {
            let (index, blocking) = joined.map_err(|e| Error::Internal(format!("check task failed: {}", e)))??;
            flags[index] = Some(blocking);
        }

        let flags = spec
            .checks()
            .iter()
            .zip(flags)
            .map(|(check, blocking)| {
                blocking
                    .map(|blocking| Flag {
                        name: check.name,
                        reason: check.reason,
                        blocking,
                    })
                    .ok_or_else(|| Error::Internal(format!("check '{}' produced no flag", check.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EligibilityResult::new(spec.operation(), flags))
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn with_deadline<F>(timeout: Option<Duration>, fut: F) -> Result<EligibilityResult>
where
    F: std::future::Future<Output = Result<EligibilityResult>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::Query(QueryError::DeadlineExceeded {
                after_ms: limit.as_millis() as u64,
            })
        })?,
        None => fut.await,
    }
}

async fn run_check(reader: Arc<dyn StateReader>, check: Check, ctx: Arc<EvalContext>) -> Result<bool> {
    let keys = check.keys(&ctx)?;
    let values = try_join_all(keys.iter().map(|key| reader.query(key))).await?;
    let observed = Observed::new(keys.into_iter().zip(values).collect());

    let blocking = check.is_blocking(&ctx, &observed)?;
    debug!(check = check.name, blocking, "Check evaluated");
    Ok(blocking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Operation, Params, StateKey, StateValue};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapReader {
        values: HashMap<String, StateValue>,
        delays: HashMap<String, Duration>,
        calls: AtomicUsize,
    }

    impl MapReader {
        fn new(values: &[(&str, StateValue)]) -> Self {
            Self {
                values: values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                delays: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn delay(mut self, key: &str, delay: Duration) -> Self {
            self.delays.insert(key.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl StateReader for MapReader {
        async fn query(&self, key: &StateKey) -> std::result::Result<StateValue, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(key.as_str()) {
                tokio::time::sleep(*delay).await;
            }
            self.values
                .get(key.as_str())
                .cloned()
                .ok_or_else(|| QueryError::UnknownKey(key.clone()))
        }
    }

    fn key_a(_: &EvalContext) -> Result<Vec<StateKey>> {
        Ok(vec![StateKey::new("a")])
    }

    fn key_b(_: &EvalContext) -> Result<Vec<StateKey>> {
        Ok(vec![StateKey::new("b")])
    }

    fn key_pair(_: &EvalContext) -> Result<Vec<StateKey>> {
        Ok(vec![StateKey::new("a"), StateKey::new("b")])
    }

    fn is_true(_: &EvalContext, observed: &Observed) -> Result<bool> {
        observed.bool(0)
    }

    fn both_true(_: &EvalContext, observed: &Observed) -> Result<bool> {
        Ok(observed.bool(0)? && observed.bool(1)?)
    }

    fn ctx() -> EvalContext {
        EvalContext::new(Address::ZERO, Params::new())
    }

    #[tokio::test]
    async fn test_flags_keep_declaration_order() {
        // b answers first but stays second in the result
        let reader = MapReader::new(&[("a", true.into()), ("b", false.into())])
            .delay("a", Duration::from_millis(20));
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("first", "a is set", key_a, is_true))
            .check(Check::new("second", "b is set", key_b, is_true));

        let result = Evaluator::new(Arc::new(reader)).evaluate(&spec, &ctx()).await.unwrap();

        let names: Vec<_> = result.flags().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!result.eligible());
        assert_eq!(result.blocking_reasons(), vec!["a is set"]);
    }

    #[tokio::test]
    async fn test_multi_key_check() {
        let reader = MapReader::new(&[("a", true.into()), ("b", true.into())]);
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("both", "both set", key_pair, both_true));

        let evaluator = Evaluator::new(Arc::new(reader));
        let result = evaluator.evaluate(&spec, &ctx()).await.unwrap();
        assert_eq!(result.flag("both"), Some(true));
    }

    #[tokio::test]
    async fn test_empty_spec_is_eligible() {
        let spec = PreconditionSpec::new(Operation::new("test.op"));
        let result = Evaluator::new(Arc::new(MapReader::new(&[])))
            .evaluate(&spec, &ctx())
            .await
            .unwrap();
        assert!(result.eligible());
        assert!(result.flags().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_value_fails_evaluation() {
        let reader = MapReader::new(&[("a", StateValue::Uint(1))]);
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("first", "a is set", key_a, is_true));

        let err = Evaluator::new(Arc::new(reader)).evaluate(&spec, &ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Malformed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let reader = MapReader::new(&[("a", true.into())]).delay("a", Duration::from_secs(60));
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("first", "a is set", key_a, is_true));

        let evaluator = Evaluator::new(Arc::new(reader)).with_timeout(Some(Duration::from_secs(5)));
        let err = evaluator.evaluate(&spec, &ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::DeadlineExceeded { after_ms: 5000 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_checks() {
        let reader = MapReader::new(&[("a", true.into())]).delay("a", Duration::from_secs(60));
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("first", "a is set", key_a, is_true));
        let evaluator = Evaluator::new(Arc::new(reader));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = evaluator
            .evaluate_cancellable(&spec, &ctx(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    fn key_registered(_: &EvalContext) -> Result<Vec<StateKey>> {
        Ok(vec![StateKey::new("registered")])
    }

    fn is_false(_: &EvalContext, observed: &Observed) -> Result<bool> {
        Ok(!observed.bool(0)?)
    }

    fn gated_spec() -> PreconditionSpec {
        PreconditionSpec::new(Operation::new("test.op"))
            .require(Check::new("registered", "not registered", key_registered, is_false))
            .check(Check::new("first", "a is set", key_a, is_true))
    }

    #[tokio::test]
    async fn test_unmet_requirement_skips_checks() {
        let reader = Arc::new(MapReader::new(&[("registered", false.into()), ("a", false.into())]));
        let evaluator = Evaluator::new(reader.clone());

        let err = evaluator.evaluate(&gated_spec(), &ctx()).await.unwrap_err();
        match err {
            Error::RequirementUnmet { operation, requirement, reason } => {
                assert_eq!(operation, "test.op");
                assert_eq!(requirement, "registered");
                assert_eq!(reason, "not registered");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_met_requirement_is_not_a_flag() {
        let reader = MapReader::new(&[("registered", true.into()), ("a", false.into())]);
        let result = Evaluator::new(Arc::new(reader))
            .evaluate(&gated_spec(), &ctx())
            .await
            .unwrap();

        assert!(result.eligible());
        assert_eq!(result.flags().len(), 1);
        assert_eq!(result.flag("registered"), None);
    }

    #[tokio::test]
    async fn test_metrics_record_outcome() {
        let metrics = Metrics::new().unwrap();
        let reader = MapReader::new(&[("a", false.into())]);
        let spec = PreconditionSpec::new(Operation::new("test.op"))
            .check(Check::new("first", "a is set", key_a, is_true));

        Evaluator::new(Arc::new(reader))
            .with_metrics(metrics.clone())
            .evaluate(&spec, &ctx())
            .await
            .unwrap();

        assert_eq!(
            metrics
                .evaluations_total
                .with_label_values(&["test.op", "eligible"])
                .get(),
            1
        );
    }
}
