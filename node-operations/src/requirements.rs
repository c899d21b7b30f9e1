//! Standing an account must have before an operation is evaluated at all
//!
//! These gate the whole evaluation: an unmet requirement is
//! [`guard_core::Error::RequirementUnmet`], never a flag.

use crate::keys;
use guard_core::{Check, EvalContext, Observed, Result, StateKey};

fn registered_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::node_exists(ctx.account)])
}

fn member_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::odao_member(ctx.account)])
}

fn not_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!seen.bool(0)?)
}

/// Signing account is a registered node
pub const NODE_REGISTERED: Check = Check::new(
    "node_registered",
    "The node is not registered with Rocket Pool",
    registered_keys,
    not_set,
);

/// Signing account is an oracle DAO member
pub const NODE_TRUSTED: Check = Check::new(
    "node_trusted",
    "The node is not a member of the oracle DAO",
    member_keys,
    not_set,
);
