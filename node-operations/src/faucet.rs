//! Testnet RPL faucet

use crate::keys;
use guard_core::{Check, EvalContext, Observed, Operation, OperationDef, PreconditionSpec, Result, StateKey};

/// Withdraw legacy RPL from the faucet
pub const WITHDRAW_RPL: Operation = Operation::new("faucet.withdraw-rpl");

fn balance_keys(_: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::faucet_balance()])
}

fn allowance_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::faucet_allowance(ctx.account)])
}

fn zero_amount(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.amount(0)?.is_zero())
}

fn fee_keys(ctx: &EvalContext) -> Result<Vec<StateKey>> {
    Ok(vec![keys::eth_balance(ctx.account), keys::faucet_withdrawal_fee()])
}

fn below_fee(_: &EvalContext, seen: &Observed) -> Result<bool> {
    Ok(seen.amount(0)? < seen.amount(1)?)
}

fn withdrawal_fee(_: &EvalContext) -> Result<StateKey> {
    Ok(keys::faucet_withdrawal_fee())
}

/// `faucet.withdraw-rpl`
///
/// The withdrawn amount is the smaller of the faucet balance and the
/// node's remaining allowance for the period; only the fee is a parameter
/// of the submission.
pub fn withdraw_rpl() -> OperationDef {
    OperationDef::new(
        PreconditionSpec::new(WITHDRAW_RPL)
            .check(Check::new(
                "insufficient_faucet_balance",
                "The faucet does not have any RPL for withdrawal",
                balance_keys,
                zero_amount,
            ))
            .check(Check::new(
                "insufficient_allowance",
                "You don't have any allowance remaining for the withdrawal period",
                allowance_keys,
                zero_amount,
            ))
            .check(Check::new(
                "insufficient_node_balance",
                "The node does not have enough ETH to pay the faucet withdrawal fee",
                fee_keys,
                below_fee,
            )),
    )
    .derive("fee", withdrawal_fee)
}
