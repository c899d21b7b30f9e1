//! End-to-end scenarios for evaluation and workflow sequencing

mod common;

use common::{fast_config, guard_with, Event, FakeLedger, APPROVE, JOIN, STAKE};
use guard_core::{
    Address, Amount, Check, ConfirmationStatus, Error, EvalContext, Evaluator, HaltReason,
    Keystore, Observed, Operation, Params, PreconditionSpec, QueryError, Sequencer, StateKey,
    WorkflowState, WorkflowStep,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn key_one(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("check.one")])
}

fn key_two(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("check.two")])
}

fn key_three(_: &EvalContext) -> guard_core::Result<Vec<StateKey>> {
    Ok(vec![StateKey::new("check.three")])
}

fn is_set(_: &EvalContext, observed: &Observed) -> guard_core::Result<bool> {
    observed.bool(0)
}

fn three_checks() -> PreconditionSpec {
    PreconditionSpec::new(Operation::new("test.three"))
        .check(Check::new("one", "first condition", key_one, is_set))
        .check(Check::new("two", "second condition", key_two, is_set))
        .check(Check::new("three", "third condition", key_three, is_set))
}

fn ctx() -> EvalContext {
    EvalContext::new(Address::ZERO, Params::new())
}

fn seed() -> Keystore {
    Keystore::from_seed(&[11u8; 32])
}

#[tokio::test]
async fn scenario_a_all_clear_is_eligible() {
    let ledger = FakeLedger::new();
    ledger.set("check.one", false);
    ledger.set("check.two", false);
    ledger.set("check.three", false);

    let result = Evaluator::new(ledger).evaluate(&three_checks(), &ctx()).await.unwrap();

    assert!(result.eligible());
    assert!(result.flags().iter().all(|f| !f.blocking));
    assert!(result.blocking_reasons().is_empty());
}

#[tokio::test]
async fn scenario_b_second_check_blocks() {
    let ledger = FakeLedger::new();
    ledger.set("check.one", false);
    ledger.set("check.two", true);
    ledger.set("check.three", false);

    let result = Evaluator::new(ledger).evaluate(&three_checks(), &ctx()).await.unwrap();

    assert!(!result.eligible());
    let flags: Vec<bool> = result.flags().iter().map(|f| f.blocking).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert_eq!(result.blocking_reasons(), vec!["second condition"]);
}

#[tokio::test]
async fn scenario_c_query_error_yields_no_result() {
    let ledger = FakeLedger::new();
    ledger.set("check.one", false);
    ledger.set("check.two", true);
    ledger.set("check.three", false);
    ledger.fail("check.one");

    let outcome = Evaluator::new(ledger).evaluate(&three_checks(), &ctx()).await;

    match outcome {
        Err(Error::Query(QueryError::Unavailable { key, .. })) => {
            assert_eq!(key.as_str(), "check.one")
        }
        other => panic!("expected a query error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_d_two_steps_included_after_polls() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", false);
    ledger.script_receipts(vec![
        ConfirmationStatus::Pending,
        ConfirmationStatus::Included { block: 2 },
    ]);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("10").unwrap());
    let steps = vec![
        WorkflowStep::new(APPROVE, params.clone()),
        WorkflowStep::new(JOIN, params).after_previous(),
    ];

    let handles = Sequencer::new(&guard).run("dao.join", &steps).await.unwrap();

    assert_eq!(handles.len(), 2);
    assert_eq!(ledger.polls(&handles[0]), 2);
    let ops: Vec<_> = ledger.submissions().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops, vec!["token.approve", "dao.join"]);
}

#[tokio::test(start_paused = true)]
async fn scenario_e_blocked_second_step_halts() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", true);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("10").unwrap());

    let err = guard.run_workflow("dao.join", &params).await.unwrap_err();

    let halted = match err {
        Error::WorkflowHalted(halted) => halted,
        other => panic!("expected a halt, got {:?}", other),
    };
    assert_eq!(halted.step, 1);
    assert_eq!(halted.completed, 1);
    assert_eq!(halted.handles.len(), 1);
    assert_eq!(halted.handles[0], ledger.submissions()[0].1);
    match &halted.reason {
        HaltReason::Blocked(result) => assert_eq!(result.flag("already_member"), Some(true)),
        other => panic!("expected blocked, got {}", other),
    }
    // No rollback and nothing further submitted
    assert_eq!(ledger.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn step_two_never_evaluated_before_step_one_included() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", false);
    ledger.script_receipts(vec![
        ConfirmationStatus::Pending,
        ConfirmationStatus::Pending,
        ConfirmationStatus::Pending,
        ConfirmationStatus::Included { block: 9 },
    ]);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());
    let handles = guard.run_workflow("dao.join", &params).await.unwrap();

    let included = ledger
        .position(|e| matches!(e, Event::Poll(h, ConfirmationStatus::Included { .. }) if *h == handles[0]))
        .unwrap();
    let second_eval = ledger
        .position(|e| matches!(e, Event::Query(k) if k == "dao.member"))
        .unwrap();
    assert!(included < second_eval);
}

#[tokio::test(start_paused = true)]
async fn state_machine_transitions_in_order() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", false);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());
    let steps = guard.workflow_steps("dao.join", &params).unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let recorder = states.clone();
    Sequencer::new(&guard)
        .on_transition(move |state| recorder.lock().push(state))
        .run("dao.join", &steps)
        .await
        .unwrap();

    assert_eq!(
        *states.lock(),
        vec![
            WorkflowState::NotStarted,
            WorkflowState::Evaluating(0),
            WorkflowState::Executing(0),
            WorkflowState::Awaiting(0),
            WorkflowState::Evaluating(1),
            WorkflowState::Executing(1),
            WorkflowState::Awaiting(1),
            WorkflowState::Completed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_confirmation_halts_without_evaluating_next_step() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", false);
    ledger.script_receipts(vec![ConfirmationStatus::Failed {
        reason: "execution reverted".into(),
    }]);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());

    let halted = match guard.run_workflow("dao.join", &params).await {
        Err(Error::WorkflowHalted(halted)) => halted,
        other => panic!("expected a halt, got {:?}", other),
    };
    assert_eq!(halted.step, 0);
    assert_eq!(halted.completed, 0);
    assert_eq!(halted.handles.len(), 1);
    assert!(matches!(halted.reason, HaltReason::Failed { .. }));
    assert!(ledger
        .position(|e| matches!(e, Event::Query(k) if k == "dao.member"))
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn timed_out_handle_rewait_never_resubmits() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.script_receipts(vec![ConfirmationStatus::Pending]);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());
    let handle = guard.execute("token.approve", &params).await.unwrap();

    for _ in 0..2 {
        let err = guard
            .await_confirmation(&handle, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { status: ConfirmationStatus::Pending, .. }
        ));
    }
    assert_eq!(ledger.submissions().len(), 1);
}

#[tokio::test]
async fn locked_signer_fails_before_any_query() {
    let ledger = FakeLedger::new();
    ledger.set("dao.member", false);

    let guard = guard_with(&ledger, Keystore::locked(), fast_config());
    let err = guard.can("dao.join", &Params::new()).await.unwrap_err();

    assert!(matches!(err, Error::SigningUnavailable(_)));
    assert!(ledger.events().is_empty());
}

#[tokio::test]
async fn submit_if_eligible_refuses_blocked() {
    let ledger = FakeLedger::new();
    ledger.set("dao.member", true);

    let guard = guard_with(&ledger, seed(), fast_config());
    let outcome = guard.submit_if_eligible("dao.join", &Params::new()).await.unwrap();

    assert!(matches!(outcome, guard_core::Outcome::Blocked(_)));
    assert!(ledger.submissions().is_empty());
}

#[tokio::test]
async fn unknown_operation() {
    let ledger = FakeLedger::new();
    let guard = guard_with(&ledger, seed(), fast_config());

    assert!(matches!(
        guard.can("dao.leave", &Params::new()).await,
        Err(Error::UnknownOperation(_))
    ));
    assert!(matches!(
        guard.run_workflow("dao.leave", &Params::new()).await,
        Err(Error::UnknownOperation(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_independent_step_is_not_counted_completed() {
    let ledger = FakeLedger::new();
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());
    ledger.set("dao.member", true);

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());
    let steps = vec![
        WorkflowStep::new(APPROVE, params.clone()),
        WorkflowStep::new(JOIN, params),
    ];

    let halted = Sequencer::new(&guard).run("dao.join", &steps).await.unwrap_err();

    assert_eq!(halted.step, 1);
    assert_eq!(halted.completed, 0);
    assert_eq!(halted.handles.len(), 1);
    assert_eq!(ledger.polls(&halted.handles[0]), 0);
}

#[tokio::test]
async fn unmet_requirement_refuses_evaluation_and_execution() {
    let ledger = FakeLedger::new();
    ledger.set("node.registered", false);
    ledger.set("token.balance", Amount::from_tokens("100").unwrap());

    let guard = guard_with(&ledger, seed(), fast_config());
    let params = Params::new().with("amount", Amount::from_tokens("1").unwrap());

    let err = guard.can(STAKE.name(), &params).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RequirementUnmet { requirement: "node_registered", .. }
    ));
    assert!(ledger
        .position(|e| matches!(e, Event::Query(k) if k == "token.balance"))
        .is_none());

    let err = guard.execute(STAKE.name(), &params).await.unwrap_err();
    assert!(err.to_string().contains("The node is not registered"), "{}", err);
    assert!(ledger.submissions().is_empty());

    ledger.set("node.registered", true);
    assert!(guard.can(STAKE.name(), &params).await.unwrap().eligible());
}
