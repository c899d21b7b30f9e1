//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for guarded mutations.
//!
//! # Metrics
//!
//! - `guard_evaluations_total{operation, outcome}` - eligible / blocked / error
//! - `guard_evaluation_duration_seconds` - Histogram of evaluation latencies
//! - `guard_submissions_total{operation, outcome}` - submitted / error
//! - `guard_confirmation_waits_total{outcome}` - included / failed / timeout / cancelled
//! - `guard_workflows_total{workflow, outcome}` - completed / halted

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Evaluations by operation and outcome
    pub evaluations_total: IntCounterVec,

    /// Evaluation duration histogram
    pub evaluation_duration: Histogram,

    /// Submissions by operation and outcome
    pub submissions_total: IntCounterVec,

    /// Confirmation waits by outcome
    pub confirmation_waits_total: IntCounterVec,

    /// Workflow runs by name and outcome
    pub workflows_total: IntCounterVec,

    /// Prometheus registry (not the global one)
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let evaluations_total = IntCounterVec::new(
            Opts::new("guard_evaluations_total", "Precondition evaluations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(evaluations_total.clone()))?;

        let evaluation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "guard_evaluation_duration_seconds",
                "Histogram of evaluation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(evaluation_duration.clone()))?;

        let submissions_total = IntCounterVec::new(
            Opts::new("guard_submissions_total", "Signed submissions"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        let confirmation_waits_total = IntCounterVec::new(
            Opts::new("guard_confirmation_waits_total", "Confirmation waits"),
            &["outcome"],
        )?;
        registry.register(Box::new(confirmation_waits_total.clone()))?;

        let workflows_total = IntCounterVec::new(
            Opts::new("guard_workflows_total", "Workflow runs"),
            &["workflow", "outcome"],
        )?;
        registry.register(Box::new(workflows_total.clone()))?;

        Ok(Self {
            evaluations_total,
            evaluation_duration,
            submissions_total,
            confirmation_waits_total,
            workflows_total,
            registry,
        })
    }

    /// Record an evaluation outcome
    pub fn record_evaluation(&self, operation: &str, outcome: &str, duration_seconds: f64) {
        self.evaluations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.evaluation_duration.observe(duration_seconds);
    }

    /// Record a submission outcome
    pub fn record_submission(&self, operation: &str, outcome: &str) {
        self.submissions_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record how a wait ended
    pub fn record_wait(&self, outcome: &str) {
        self.confirmation_waits_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record how a workflow ended
    pub fn record_workflow(&self, workflow: &str, outcome: &str) {
        self.workflows_total
            .with_label_values(&[workflow, outcome])
            .inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
