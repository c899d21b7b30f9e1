//! Oracle DAO membership and proposals
//!
//! Invitations and proposal cooldowns are judged against the chain
//! timestamp, so every time-based check reads [`StateKey::timestamp`]
//! alongside its settings.

use crate::keys;
use crate::requirements::{NODE_REGISTERED, NODE_TRUSTED};
use guard_core::{
    Check, Error, EvalContext, Observed, Operation, OperationDef, Params, PreconditionSpec, Result, StateKey,
};

/// Approve the DAO actions contract to take the RPL bond
pub const APPROVE_RPL_BOND: Operation = Operation::new("odao.approve-rpl-bond");
/// Join after an executed invitation
pub const JOIN: Operation = Operation::new("odao.join");
/// Propose inviting a new member
pub const PROPOSE_INVITE: Operation = Operation::new("odao.propose-invite");
/// Propose that the node leaves
pub const PROPOSE_LEAVE: Operation = Operation::new("odao.propose-leave");
/// Cancel one of the node's proposals
pub const CANCEL_PROPOSAL: Operation = Operation::new("odao.cancel-proposal");
/// Propose a settings change
pub const PROPOSE_SETTING: Operation = Operation::new("odao.propose-setting");

/// Proposal state: created, voting not yet open
pub const PROPOSAL_PENDING: u64 = 0;
/// Proposal state: voting open
pub const PROPOSAL_ACTIVE: u64 = 1;

/// Settings a member may propose changing
pub const SETTINGS: &[&str] = &[
    "members.quorum",
    "members.rplbond",
    "minipool.unbonded.max",
    "proposal.cooldown",
    "proposal.vote.blocks",
    "proposal.vote.delay.blocks",
    "proposal.execute.blocks",
    "proposal.action.blocks",
];

/// An executed invitation can still be acted on
pub fn invitation_actionable(executed_time: u64, action_window: u64, now: u64) -> bool {
    executed_time != 0 && executed_time.saturating_add(action_window) > now
}

/// The member proposed too recently
pub fn proposal_cooldown_active(last_proposal_time: u64, cooldown: u64, now: u64) -> bool {
    last_proposal_time.saturating_add(cooldown) > now
}

/// Membership is above the floor
pub fn members_can_leave(member_count: u64, minimum_members: u64) -> bool {
    member_count > minimum_members
}

fn invitation_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![
        keys::odao_invite_executed(ctx.account),
        keys::odao_action_window(),
        StateKey::timestamp(),
    ])
}

fn invitation_expired(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!invitation_actionable(seen.uint(0)?, seen.uint(1)?, seen.uint(2)?))
}

fn node_member_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::odao_member(ctx.account)])
}

fn invitee_member_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::odao_member(ctx.params.address("member")?)])
}

fn is_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    seen.bool(0)
}

fn bond_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::rpl_balance(ctx.account), keys::odao_rpl_bond()])
}

fn below_bond(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.amount(0)? < seen.amount(1)?)
}

fn cooldown_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![
        keys::odao_last_proposal_time(ctx.account),
        keys::odao_proposal_cooldown(),
        StateKey::timestamp(),
    ])
}

fn cooldown_active(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(proposal_cooldown_active(seen.uint(0)?, seen.uint(1)?, seen.uint(2)?))
}

fn member_count_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::odao_member_count(), keys::odao_minimum_members()])
}

fn at_member_floor(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!members_can_leave(seen.uint(0)?, seen.uint(1)?))
}

fn proposal_count_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::proposal_count()])
}

fn beyond_count(ctx: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(ctx.params.uint("proposal_id")? > seen.uint(0)?)
}

fn proposal_state_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::proposal_state(ctx.params.uint("proposal_id")?)])
}

fn not_cancellable(_: &EvalContext, seen: &Observed) -> Result<bool> {
    let state = seen.uint(0)?;
    Ok(state != PROPOSAL_PENDING && state != PROPOSAL_ACTIVE)
}

fn proposer_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::proposal_proposer(ctx.params.uint("proposal_id")?)])
}

fn not_proposer(ctx: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.address(0)? != ctx.account)
}

const PROPOSAL_COOLDOWN: Check = Check::new(
    "proposal_cooldown_active",
    "The node must wait for the proposal cooldown period to pass before making another proposal",
    cooldown_keys,
    cooldown_active,
);

fn join_spec(operation: Operation) -> PreconditionSpec {
    PreconditionSpec::new(operation)
        .require(NODE_REGISTERED)
        .check(Check::new(
            "proposal_expired",
            "The node's invitation to join has expired or was never executed",
            invitation_keys,
            invitation_expired,
        ))
        .check(Check::new(
            "already_member",
            "The node is already a member of the oracle DAO",
            node_member_keys,
            is_set,
        ))
        .check(Check::new(
            "insufficient_rpl_balance",
            "The node does not have enough RPL to pay the bond",
            bond_keys,
            below_bond,
        ))
}

fn actions_contract(_: &EvalContext) -> Result<StateKey> {
    Ok(keys::contract_address(keys::ODAO_ACTIONS_CONTRACT))
}

fn rpl_bond(_: &EvalContext) -> Result<StateKey> {
    Ok(keys::odao_rpl_bond())
}

fn node_member_id(ctx: &EvalContext) -> Result<StateKey> {
    Ok(keys::odao_member_id(ctx.account))
}

fn node_member_email(ctx: &EvalContext) -> Result<StateKey> {
    Ok(keys::odao_member_email(ctx.account))
}

fn invite_message(params: &mut Params) -> Result<()> {
    let message = format!("invite {} ({})", params.text("member_id")?, params.text("member_email")?);
    params.insert("message", message);
    Ok(())
}

fn leave_message(params: &mut Params) -> Result<()> {
    let message = format!("{} ({}) leaves", params.text("member_id")?, params.text("member_email")?);
    params.insert("message", message);
    Ok(())
}

fn known_setting(params: &mut Params) -> Result<()> {
    let setting = params.text("setting")?;
    if !SETTINGS.contains(&setting) {
        return Err(Error::InvalidParams(format!("unknown setting '{}'", setting)));
    }
    if !params.contains("value") {
        return Err(Error::InvalidParams("missing parameter 'value'".to_string()));
    }
    Ok(())
}

/// `odao.approve-rpl-bond`
pub fn approve_rpl_bond() -> OperationDef {
    OperationDef::new(join_spec(APPROVE_RPL_BOND))
        .derive("spender", actions_contract)
        .derive("amount", rpl_bond)
}

/// `odao.join`
pub fn join() -> OperationDef {
    OperationDef::new(join_spec(JOIN))
}

/// `odao.propose-invite`
pub fn propose_invite() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(PROPOSE_INVITE)
            .require(NODE_TRUSTED)
            .check(PROPOSAL_COOLDOWN)
            .check(Check::new(
                "member_already_exists",
                "The invited account is already a member",
                invitee_member_keys,
                is_set,
            )),
    )
    .compose(invite_message)
}

/// `odao.propose-leave`
pub fn propose_leave() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(PROPOSE_LEAVE)
            .require(NODE_TRUSTED)
            .check(PROPOSAL_COOLDOWN)
            .check(Check::new(
                "insufficient_members",
                "The oracle DAO is at its minimum member count",
                member_count_keys,
                at_member_floor,
            )),
    )
    .derive("member_id", node_member_id)
    .derive("member_email", node_member_email)
    .compose(leave_message)
}

/// `odao.cancel-proposal`
pub fn cancel_proposal() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(CANCEL_PROPOSAL)
            .require(NODE_TRUSTED)
            .check(Check::new(
                "does_not_exist",
                "The proposal does not exist",
                proposal_count_keys,
                beyond_count,
            ))
            .check(Check::new(
                "invalid_state",
                "The proposal is not pending or active",
                proposal_state_keys,
                not_cancellable,
            ))
            .check(Check::new(
                "invalid_proposer",
                "The proposal was not made by the node",
                proposer_keys,
                not_proposer,
            )),
    )
}

/// `odao.propose-setting`
pub fn propose_setting() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(PROPOSE_SETTING)
            .require(NODE_TRUSTED)
            .check(PROPOSAL_COOLDOWN),
    )
    .compose(known_setting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_window() {
        assert!(!invitation_actionable(0, 1_000, 10));
        assert!(invitation_actionable(100, 1_000, 1_099));
        assert!(!invitation_actionable(100, 1_000, 1_100));
    }

    #[test]
    fn test_cooldown() {
        assert!(proposal_cooldown_active(100, 50, 149));
        assert!(!proposal_cooldown_active(100, 50, 150));
        assert!(!proposal_cooldown_active(0, 0, 0));
    }

    #[test]
    fn test_member_floor() {
        assert!(members_can_leave(4, 3));
        assert!(!members_can_leave(3, 3));
    }

    #[test]
    fn test_compose_messages() {
        let mut params = Params::new().with("member_id", "alpha").with("member_email", "ops@alpha.io");
        invite_message(&mut params).unwrap();
        assert_eq!(params.text("message").unwrap(), "invite alpha (ops@alpha.io)");

        leave_message(&mut params).unwrap();
        assert_eq!(params.text("message").unwrap(), "alpha (ops@alpha.io) leaves");
    }

    #[test]
    fn test_unknown_setting_rejected() {
        let mut params = Params::new().with("setting", "members.quorum").with("value", 51u64);
        known_setting(&mut params).unwrap();

        let mut params = Params::new().with("setting", "members.size").with("value", 1u64);
        assert!(matches!(known_setting(&mut params), Err(Error::InvalidParams(_))));
    }
}
