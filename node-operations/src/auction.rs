//! RPL auction lots

use crate::keys;
use guard_core::{Check, EvalContext, Observed, Operation, OperationDef, PreconditionSpec, Result, StateKey};

/// Bid ETH on a lot
pub const BID_LOT: Operation = Operation::new("auction.bid-lot");
/// Claim RPL from a cleared lot
pub const CLAIM_LOT: Operation = Operation::new("auction.claim-lot");

fn lot_index(ctx: &EvalContext) -> Result<u64> {
    ctx.params.uint("lot_index")
}

fn exists_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::lot_exists(lot_index(ctx)?)])
}

fn not_set(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(!seen.bool(0)?)
}

fn end_block_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![StateKey::block_number(), keys::lot_end_block(lot_index(ctx)?)])
}

fn bidding_ended(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.uint(0)? >= seen.uint(1)?)
}

fn remaining_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::lot_remaining_rpl(lot_index(ctx)?)])
}

fn zero_amount(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.amount(0)?.is_zero())
}

fn enabled_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::bid_on_lot_enabled()])
}

fn bid_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::lot_bid(lot_index(ctx)?, ctx.account)])
}

fn cleared_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::lot_cleared(lot_index(ctx)?)])
}

const DOES_NOT_EXIST: Check = Check::new("does_not_exist", "The lot does not exist", exists_keys, not_set);

/// `auction.bid-lot`
pub fn bid_lot() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(BID_LOT)
            .check(DOES_NOT_EXIST)
            .check(Check::new(
                "bidding_ended",
                "Bidding on the lot has ended",
                end_block_keys,
                bidding_ended,
            ))
            .check(Check::new(
                "rpl_exhausted",
                "The lot has no RPL remaining",
                remaining_keys,
                zero_amount,
            ))
            .check(Check::new(
                "bid_on_lot_disabled",
                "Bidding on lots is currently disabled",
                enabled_keys,
                not_set,
            )),
    )
}

/// `auction.claim-lot`
pub fn claim_lot() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(CLAIM_LOT)
            .check(DOES_NOT_EXIST)
            .check(Check::new(
                "no_bid_from_address",
                "The node has not bid on the lot",
                bid_keys,
                zero_amount,
            ))
            .check(Check::new(
                "not_cleared",
                "The lot has not been cleared yet",
                cleared_keys,
                not_set,
            )),
    )
}
