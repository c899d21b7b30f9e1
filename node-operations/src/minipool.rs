//! Minipools
//!
//! Closing is only open to the minipool's own node, so ownership is a
//! requirement rather than a flag.

use crate::keys;
use crate::requirements::NODE_REGISTERED;
use guard_core::{Check, EvalContext, Observed, Operation, OperationDef, PreconditionSpec, Result, StateKey};

/// Close a dissolved minipool and recover its balance
pub const CLOSE: Operation = Operation::new("minipool.close");

/// Status code of a dissolved minipool
pub const STATUS_DISSOLVED: u64 = 4;

fn owner_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::minipool_owner(ctx.params.address("minipool")?)])
}

fn not_owner(ctx: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.address(0)? != ctx.account)
}

fn status_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::minipool_status(ctx.params.address("minipool")?)])
}

fn not_dissolved(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.uint(0)? != STATUS_DISSOLVED)
}

/// `minipool.close`
pub fn close() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(CLOSE)
            .require(NODE_REGISTERED)
            .require(Check::new(
                "minipool_owner",
                "The minipool is not owned by the node",
                owner_keys,
                not_owner,
            ))
            .check(Check::new(
                "invalid_status",
                "The minipool is not dissolved",
                status_keys,
                not_dissolved,
            )),
    )
}
