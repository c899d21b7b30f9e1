//! State transitions for the simulated ledger
//!
//! Each included transaction applies a simplified version of what the
//! contract call would do, so that later evaluations observe the change.

use guard_core::{Address, SignedEnvelope, StateKey};
use ledger_sim::{ChainState, TransitionHook};
use node_operations::{auction, deposit, faucet, keys, minipool, node, odao};
use std::sync::Arc;

type Applied = std::result::Result<(), String>;

/// Proposal state after cancellation
const PROPOSAL_CANCELLED: u64 = 2;

fn param<T>(value: guard_core::Result<T>) -> std::result::Result<T, String> {
    value.map_err(|e| e.to_string())
}

fn contract(state: &ChainState, name: &str) -> std::result::Result<Address, String> {
    state.address(&keys::contract_address(name))
}

fn bid_lot(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let lot = param(tx.params.uint("lot_index"))?;
    let amount = param(tx.params.amount("amount"))?;
    if !state.bool(&keys::lot_exists(lot))? {
        return Err(format!("lot {} does not exist", lot));
    }
    state.credit(&keys::lot_bid(lot, tx.signer), amount)
}

fn claim_lot(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let lot = param(tx.params.uint("lot_index"))?;
    let bid = keys::lot_bid(lot, tx.signer);
    let amount = state.amount(&bid)?;
    state.set(bid, guard_core::Amount::ZERO);
    state.credit(&keys::rpl_balance(tx.signer), amount)
}

fn register(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    if state.bool(&keys::node_exists(tx.signer))? {
        return Err(format!("node {} is already registered", tx.signer));
    }
    let timezone = param(tx.params.text("timezone"))?;
    state.set(keys::node_timezone(tx.signer), timezone);
    state.set(keys::node_exists(tx.signer), true);
    Ok(())
}

/// Pays out `min(faucet balance, allowance)` in legacy RPL for the fee in ETH
fn faucet_withdraw(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let fee = state.amount(&keys::faucet_withdrawal_fee())?;
    let allowance = state.amount(&keys::faucet_allowance(tx.signer))?;
    let amount = state.amount(&keys::faucet_balance())?.min(allowance);
    if amount.is_zero() {
        return Err("nothing to withdraw from the faucet".to_string());
    }
    state.debit(&keys::eth_balance(tx.signer), fee)?;
    state.debit(&keys::faucet_balance(), amount)?;
    state.debit(&keys::faucet_allowance(tx.signer), amount)?;
    state.credit(&keys::fixed_supply_rpl_balance(tx.signer), amount)
}

fn reserve_deposit(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let duration = param(tx.params.text("duration_id"))?;
    let pubkey = param(tx.params.text("validator_pubkey"))?;
    if state.bool(&keys::deposit_reservation(tx.signer))? {
        return Err(format!("node {} already has a deposit reservation", tx.signer));
    }
    state.set(keys::deposit_reservation(tx.signer), true);
    state.set(keys::deposit_reservation_duration(tx.signer), duration);
    state.set(keys::validator_pubkey_used(pubkey), true);
    Ok(())
}

fn withdraw_rpl(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let amount = param(tx.params.amount("amount"))?;
    state.debit(&keys::rpl_stake(tx.signer), amount)?;
    state.credit(&keys::rpl_balance(tx.signer), amount)
}

fn approve_fixed_supply(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let spender = param(tx.params.address("spender"))?;
    let amount = param(tx.params.amount("amount"))?;
    state.set(keys::fixed_supply_rpl_allowance(tx.signer, spender), amount);
    Ok(())
}

fn swap_rpl(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let amount = param(tx.params.amount("amount"))?;
    let token = contract(state, keys::RPL_TOKEN_CONTRACT)?;
    state.debit(&keys::fixed_supply_rpl_allowance(tx.signer, token), amount)?;
    state.debit(&keys::fixed_supply_rpl_balance(tx.signer), amount)?;
    state.credit(&keys::rpl_balance(tx.signer), amount)
}

fn close_minipool(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let pool = param(tx.params.address("minipool"))?;
    if state.address(&keys::minipool_owner(pool))? != tx.signer {
        return Err(format!("minipool {} is not owned by {}", pool, tx.signer));
    }
    state.set(keys::minipool_owner(pool), Address::ZERO);
    Ok(())
}

fn approve_rpl_bond(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let spender = param(tx.params.address("spender"))?;
    let amount = param(tx.params.amount("amount"))?;
    state.set(keys::rpl_allowance(tx.signer, spender), amount);
    Ok(())
}

fn join(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let bond = state.amount(&keys::odao_rpl_bond())?;
    let actions = contract(state, keys::ODAO_ACTIONS_CONTRACT)?;
    state.debit(&keys::rpl_allowance(tx.signer, actions), bond)?;
    state.debit(&keys::rpl_balance(tx.signer), bond)?;
    state.set(keys::odao_member(tx.signer), true);

    let count = state.uint(&keys::odao_member_count())?;
    state.set(keys::odao_member_count(), count + 1);
    Ok(())
}

/// Record a new proposal by the signer
fn propose(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let id = state.uint(&keys::proposal_count())? + 1;
    state.set(keys::proposal_count(), id);
    state.set(keys::proposal_state(id), odao::PROPOSAL_PENDING);
    state.set(keys::proposal_proposer(id), tx.signer);
    if let Ok(message) = tx.params.text("message") {
        state.set(keys::proposal_message(id), message);
    }

    let now = state.uint(&StateKey::timestamp())?;
    state.set(keys::odao_last_proposal_time(tx.signer), now);
    Ok(())
}

fn cancel_proposal(tx: &SignedEnvelope, state: &mut ChainState) -> Applied {
    let id = param(tx.params.uint("proposal_id"))?;
    if state.address(&keys::proposal_proposer(id))? != tx.signer {
        return Err(format!("proposal {} was not made by {}", id, tx.signer));
    }
    state.set(keys::proposal_state(id), PROPOSAL_CANCELLED);
    Ok(())
}

fn hook(f: fn(&SignedEnvelope, &mut ChainState) -> Applied) -> TransitionHook {
    Arc::new(f)
}

/// Transitions for every catalogued operation
pub fn hooks() -> Vec<(String, TransitionHook)> {
    vec![
        (auction::BID_LOT.name().to_string(), hook(bid_lot)),
        (auction::CLAIM_LOT.name().to_string(), hook(claim_lot)),
        (node::REGISTER.name().to_string(), hook(register)),
        (node::WITHDRAW_RPL.name().to_string(), hook(withdraw_rpl)),
        (node::APPROVE_FIXED_SUPPLY_RPL.name().to_string(), hook(approve_fixed_supply)),
        (node::SWAP_RPL.name().to_string(), hook(swap_rpl)),
        (faucet::WITHDRAW_RPL.name().to_string(), hook(faucet_withdraw)),
        (deposit::RESERVE.name().to_string(), hook(reserve_deposit)),
        (minipool::CLOSE.name().to_string(), hook(close_minipool)),
        (odao::APPROVE_RPL_BOND.name().to_string(), hook(approve_rpl_bond)),
        (odao::JOIN.name().to_string(), hook(join)),
        (odao::PROPOSE_INVITE.name().to_string(), hook(propose)),
        (odao::PROPOSE_LEAVE.name().to_string(), hook(propose)),
        (odao::PROPOSE_SETTING.name().to_string(), hook(propose)),
        (odao::CANCEL_PROPOSAL.name().to_string(), hook(cancel_proposal)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use guard_core::{Amount, Keystore, Params, Signer};

    async fn signed(operation: guard_core::Operation, params: Params) -> SignedEnvelope {
        Keystore::from_seed(&[3u8; 32]).authorize(operation, &params).await.unwrap()
    }

    #[tokio::test]
    async fn test_swap_needs_allowance() {
        let tx = signed(node::SWAP_RPL, Params::new().with("amount", Amount::from_wei(10))).await;
        let mut state = ChainState::new(1, 0);
        state.set(keys::contract_address(keys::RPL_TOKEN_CONTRACT), Address::from_bytes([1u8; 20]));
        state.set(keys::fixed_supply_rpl_balance(tx.signer), Amount::from_wei(10));

        assert!(swap_rpl(&tx, &mut state).is_err());

        state.set(
            keys::fixed_supply_rpl_allowance(tx.signer, Address::from_bytes([1u8; 20])),
            Amount::from_wei(10),
        );
        swap_rpl(&tx, &mut state).unwrap();
        assert_eq!(state.amount(&keys::rpl_balance(tx.signer)).unwrap(), Amount::from_wei(10));
        assert!(state.amount(&keys::fixed_supply_rpl_balance(tx.signer)).unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_faucet_pays_out_up_to_allowance() {
        let tx = signed(faucet::WITHDRAW_RPL, Params::new()).await;
        let mut state = ChainState::new(1, 0);
        state.set(keys::faucet_balance(), Amount::from_wei(1_000));
        state.set(keys::faucet_allowance(tx.signer), Amount::from_wei(300));
        state.set(keys::faucet_withdrawal_fee(), Amount::from_wei(5));
        state.set(keys::eth_balance(tx.signer), Amount::from_wei(7));

        faucet_withdraw(&tx, &mut state).unwrap();
        assert_eq!(state.amount(&keys::fixed_supply_rpl_balance(tx.signer)).unwrap(), Amount::from_wei(300));
        assert_eq!(state.amount(&keys::faucet_balance()).unwrap(), Amount::from_wei(700));
        assert_eq!(state.amount(&keys::eth_balance(tx.signer)).unwrap(), Amount::from_wei(2));
        assert!(state.amount(&keys::faucet_allowance(tx.signer)).unwrap().is_zero());

        assert!(faucet_withdraw(&tx, &mut state).is_err());
    }

    #[tokio::test]
    async fn test_register_then_reserve() {
        let pubkey = format!("0x{}", "cd".repeat(48));
        let tx = signed(node::REGISTER, Params::new().with("timezone", "Europe/Berlin")).await;
        let mut state = ChainState::new(1, 0);

        register(&tx, &mut state).unwrap();
        assert!(state.bool(&keys::node_exists(tx.signer)).unwrap());
        assert!(register(&tx, &mut state).is_err());

        let tx = signed(
            deposit::RESERVE,
            Params::new().with("duration_id", "6m").with("validator_pubkey", pubkey.as_str()),
        )
        .await;
        reserve_deposit(&tx, &mut state).unwrap();
        assert!(state.bool(&keys::deposit_reservation(tx.signer)).unwrap());
        assert!(state.bool(&keys::validator_pubkey_used(&pubkey)).unwrap());
        assert!(reserve_deposit(&tx, &mut state).is_err());
    }

    #[tokio::test]
    async fn test_proposals_are_numbered() {
        let tx = signed(odao::PROPOSE_SETTING, Params::new().with("setting", "members.quorum")).await;
        let mut state = ChainState::new(1, 500);

        propose(&tx, &mut state).unwrap();
        propose(&tx, &mut state).unwrap();

        assert_eq!(state.uint(&keys::proposal_count()).unwrap(), 2);
        assert_eq!(state.address(&keys::proposal_proposer(2)).unwrap(), tx.signer);
        assert_eq!(state.uint(&keys::odao_last_proposal_time(tx.signer)).unwrap(), 500);
    }
}
