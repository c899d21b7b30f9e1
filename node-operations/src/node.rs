//! Node registration, RPL staking and the legacy token swap

use crate::keys;
use crate::requirements::NODE_REGISTERED;
use guard_core::{
    Check, Error, EvalContext, Observed, Operation, OperationDef, Params, PreconditionSpec, Result, StateKey,
};

/// Register the signing account as a node
pub const REGISTER: Operation = Operation::new("node.register");
/// Withdraw staked RPL
pub const WITHDRAW_RPL: Operation = Operation::new("node.withdraw-rpl");
/// Approve the RPL token contract to pull legacy RPL
pub const APPROVE_FIXED_SUPPLY_RPL: Operation = Operation::new("node.approve-fixed-supply-rpl");
/// Swap legacy RPL for new RPL
pub const SWAP_RPL: Operation = Operation::new("node.swap-rpl");

fn exists_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::node_exists(ctx.account)])
}

fn registration_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::node_registration_enabled()])
}

fn is_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    seen.bool(0)
}

fn not_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!seen.bool(0)?)
}

/// `Area/Location` form, e.g. `Europe/Berlin` or `America/Argentina/Cordoba`
pub fn valid_timezone(timezone: &str) -> bool {
    let mut segments = 0;
    for segment in timezone.split('/') {
        if segment.len() < 2 || !segment.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

fn checked_timezone(params: &mut Params) -> Result<()> {
    let timezone = params.text("timezone")?;
    if !valid_timezone(timezone) {
        return Err(Error::InvalidParams(format!("invalid timezone location '{}'", timezone)));
    }
    Ok(())
}

fn stake_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::rpl_stake(ctx.account)])
}

fn exceeds_balance(ctx: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(ctx.params.amount("amount")? > seen.amount(0)?)
}

fn collateral_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::rpl_stake(ctx.account), keys::minimum_rpl_stake(ctx.account)])
}

/// Remaining stake would drop below the minimum
fn undercollateralized(ctx: &EvalContext, seen: &Observed) -> Result<bool> {
    let amount = ctx.params.amount("amount")?;
    let stake = seen.amount(0)?;
    let minimum = seen.amount(1)?;
    Ok(match stake.checked_sub(amount) {
        Some(remaining) => remaining < minimum,
        None => true,
    })
}

fn delay_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![
        StateKey::block_number(),
        keys::rpl_staked_block(ctx.account),
        keys::withdrawal_delay(),
    ])
}

fn delay_active(_: &EvalContext, seen: &Observed) -> Result<bool> {
    let current = seen.uint(0)?;
    let staked = seen.uint(1)?;
    Ok(current.saturating_sub(staked) < seen.uint(2)?)
}

fn legacy_balance_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::fixed_supply_rpl_balance(ctx.account)])
}

fn rpl_token_address(_: &EvalContext) -> Result<StateKey> {
    Ok(keys::contract_address(keys::RPL_TOKEN_CONTRACT))
}

fn legacy_balance_spec(operation: Operation) -> PreconditionSpec {
    PreconditionSpec::new(operation).check(Check::new(
        "insufficient_balance",
        "The amount exceeds the node's fixed-supply RPL balance",
        legacy_balance_keys,
        exceeds_balance,
    ))
}

/// `node.register`
pub fn register() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(REGISTER)
            .check(Check::new(
                "already_registered",
                "The node is already registered with Rocket Pool",
                exists_keys,
                is_set,
            ))
            .check(Check::new(
                "registration_disabled",
                "Node registrations are currently disabled",
                registration_keys,
                not_set,
            )),
    )
    .compose(checked_timezone)
}

/// `node.withdraw-rpl`
pub fn withdraw_rpl() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(WITHDRAW_RPL)
            .require(NODE_REGISTERED)
            .check(Check::new(
                "insufficient_balance",
                "The amount exceeds the node's RPL stake",
                stake_keys,
                exceeds_balance,
            ))
            .check(Check::new(
                "minipools_undercollateralized",
                "Withdrawing would leave the node's minipools undercollateralized",
                collateral_keys,
                undercollateralized,
            ))
            .check(Check::new(
                "withdrawal_delay_active",
                "The RPL withdrawal delay since the last stake is still active",
                delay_keys,
                delay_active,
            )),
    )
}

/// `node.approve-fixed-supply-rpl`
pub fn approve_fixed_supply_rpl() -> OperationDef {
    OperationDef::new(legacy_balance_spec(APPROVE_FIXED_SUPPLY_RPL)).derive("spender", rpl_token_address)
}

/// `node.swap-rpl`
pub fn swap_rpl() -> OperationDef {
    OperationDef::new(legacy_balance_spec(SWAP_RPL))
}
