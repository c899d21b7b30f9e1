//! Minipool deposit reservations

use crate::keys;
use crate::requirements::NODE_REGISTERED;
use guard_core::{
    Check, Error, EvalContext, Observed, Operation, OperationDef, Params, PreconditionSpec, Result, StateKey,
};

/// Reserve a deposit slot for a new validator
pub const RESERVE: Operation = Operation::new("deposit.reserve");

/// Staking duration ids a reservation may name
pub const DURATIONS: &[&str] = &["3m", "6m", "12m"];

fn reservation_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::deposit_reservation(ctx.account)])
}

fn deposits_enabled_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::node_deposits_enabled()])
}

fn pubkey_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::validator_pubkey_used(ctx.params.text("validator_pubkey")?)])
}

fn is_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    seen.bool(0)
}

fn not_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!seen.bool(0)?)
}

/// A 48-byte BLS public key, `0x`-prefixed hex
pub fn valid_pubkey(pubkey: &str) -> bool {
    match pubkey.strip_prefix("0x") {
        Some(hex) => hex.len() == 96 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn checked_reservation(params: &mut Params) -> Result<()> {
    let duration = params.text("duration_id")?;
    if !DURATIONS.contains(&duration) {
        return Err(Error::InvalidParams(format!("unknown staking duration '{}'", duration)));
    }
    let pubkey = params.text("validator_pubkey")?;
    if !valid_pubkey(pubkey) {
        return Err(Error::InvalidParams(format!("invalid validator pubkey '{}'", pubkey)));
    }
    Ok(())
}

/// `deposit.reserve`
pub fn reserve() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(RESERVE)
            .require(NODE_REGISTERED)
            .check(Check::new(
                "has_reservation",
                "Node has a current deposit reservation, please cancel or complete it",
                reservation_keys,
                is_set,
            ))
            .check(Check::new(
                "deposits_disabled",
                "Node deposits are currently disabled in Rocket Pool",
                deposits_enabled_keys,
                not_set,
            ))
            .check(Check::new(
                "pubkey_used",
                "The public key is already in use",
                pubkey_keys,
                is_set,
            )),
    )
    .compose(checked_reservation)
}
