//! Operation registry
//!
//! Process-wide, read-only table of operations and workflows, built once at
//! startup.

use crate::error::{Error, Result};
use crate::precondition::{EvalContext, PreconditionSpec};
use crate::types::{Operation, Params, StateKey};
use crate::workflow::WorkflowStep;
use std::collections::BTreeMap;

/// Builds a parameter from the others just before signing
pub type ComposeFn = fn(&mut Params) -> Result<()>;

/// A parameter read from remote state just before signing
#[derive(Clone, Copy)]
pub struct DerivedParam {
    /// Parameter name
    pub name: &'static str,
    /// Key to read
    pub key: fn(&EvalContext) -> Result<StateKey>,
}

impl std::fmt::Debug for DerivedParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedParam").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Everything needed to guard and execute one operation
#[derive(Clone)]
pub struct OperationDef {
    spec: PreconditionSpec,
    derived: Vec<DerivedParam>,
    compose: Option<ComposeFn>,
}

impl OperationDef {
    /// Operation guarded by `spec`
    pub fn new(spec: PreconditionSpec) -> Self {
        Self {
            spec,
            derived: Vec::new(),
            compose: None,
        }
    }

    /// Derive `name` from `key` before signing
    pub fn derive(mut self, name: &'static str, key: fn(&EvalContext) -> Result<StateKey>) -> Self {
        self.derived.push(DerivedParam { name, key });
        self
    }

    /// Compose parameters before signing
    pub fn compose(mut self, compose: ComposeFn) -> Self {
        self.compose = Some(compose);
        self
    }

    /// Operation
    pub fn operation(&self) -> Operation {
        self.spec.operation()
    }

    /// Precondition spec
    pub fn spec(&self) -> &PreconditionSpec {
        &self.spec
    }

    /// Derived parameters
    pub fn derived(&self) -> &[DerivedParam] {
        &self.derived
    }

    /// Compose step
    pub fn composer(&self) -> Option<ComposeFn> {
        self.compose
    }
}

impl std::fmt::Debug for OperationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDef")
            .field("spec", &self.spec)
            .field("derived", &self.derived)
            .field("composed", &self.compose.is_some())
            .finish()
    }
}

/// Named, ordered list of operations
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    name: &'static str,
    steps: Vec<(Operation, bool)>,
}

impl WorkflowTemplate {
    /// Empty workflow
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// First step, or a step that does not wait for its predecessor
    pub fn step(mut self, operation: Operation) -> Self {
        self.steps.push((operation, false));
        self
    }

    /// Step that waits for its predecessor to be included
    pub fn then(mut self, operation: Operation) -> Self {
        self.steps.push((operation, true));
        self
    }

    /// Append another workflow; its first step waits for our last step
    pub fn chain(mut self, other: &WorkflowTemplate) -> Self {
        let first = self.steps.is_empty();
        for (index, (operation, depends)) in other.steps.iter().enumerate() {
            let depends = if index == 0 { !first } else { *depends };
            self.steps.push((*operation, depends));
        }
        self
    }

    /// Workflow name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Operations in order
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.steps.iter().map(|(op, _)| *op)
    }

    /// Concrete steps sharing one parameter bundle
    pub fn instantiate(&self, params: &Params) -> Vec<WorkflowStep> {
        self.steps
            .iter()
            .map(|(operation, depends)| WorkflowStep {
                operation: *operation,
                params: params.clone(),
                depends_on_previous: *depends,
            })
            .collect()
    }
}

/// Registered operations and workflows
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<&'static str, OperationDef>,
    workflows: BTreeMap<&'static str, WorkflowTemplate>,
}

impl OperationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation
    pub fn register(&mut self, def: OperationDef) -> Result<()> {
        def.spec().validate()?;
        let name = def.operation().name();
        if self.operations.contains_key(name) {
            return Err(Error::InvalidSpec(format!("operation {} registered twice", name)));
        }
        self.operations.insert(name, def);
        Ok(())
    }

    /// Register a workflow; every step must already be registered
    pub fn register_workflow(&mut self, workflow: WorkflowTemplate) -> Result<()> {
        if workflow.steps.is_empty() {
            return Err(Error::InvalidSpec(format!("workflow {} has no steps", workflow.name)));
        }
        if let Some(missing) = workflow
            .operations()
            .find(|op| !self.operations.contains_key(op.name()))
        {
            return Err(Error::InvalidSpec(format!(
                "workflow {} uses unregistered operation {}",
                workflow.name, missing
            )));
        }
        if self.workflows.contains_key(workflow.name) {
            return Err(Error::InvalidSpec(format!("workflow {} registered twice", workflow.name)));
        }
        self.workflows.insert(workflow.name, workflow);
        Ok(())
    }

    /// Look up an operation by name
    pub fn operation(&self, name: &str) -> Result<&OperationDef> {
        self.operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// Look up a workflow by name
    pub fn workflow(&self, name: &str) -> Result<&WorkflowTemplate> {
        self.workflows
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// Registered operation names
    pub fn operation_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operations.keys().copied()
    }

    /// Registered workflow names
    pub fn workflow_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.workflows.keys().copied()
    }
}
