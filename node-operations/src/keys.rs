//! State keys read by the operation catalogue
//!
//! Paths mirror the contract getters they stand for. Per-account and
//! per-item keys append the argument after a `/`.

use guard_core::{Address, StateKey};

/// Contract name of the RPL token
pub const RPL_TOKEN_CONTRACT: &str = "rocketTokenRPL";
/// Contract name of the oracle DAO actions contract
pub const ODAO_ACTIONS_CONTRACT: &str = "rocketDAONodeTrustedActions";

/// Deployed address of a named contract
pub fn contract_address(name: &str) -> StateKey {
    StateKey::new("contract.address").arg(name)
}

// Auction

/// Lot exists
pub fn lot_exists(lot: u64) -> StateKey {
    StateKey::new("auction.lot.exists").arg(lot)
}

/// Block at which bidding on a lot closes
pub fn lot_end_block(lot: u64) -> StateKey {
    StateKey::new("auction.lot.end-block").arg(lot)
}

/// RPL still available in a lot
pub fn lot_remaining_rpl(lot: u64) -> StateKey {
    StateKey::new("auction.lot.remaining-rpl").arg(lot)
}

/// Lot has been cleared
pub fn lot_cleared(lot: u64) -> StateKey {
    StateKey::new("auction.lot.cleared").arg(lot)
}

/// ETH bid by `bidder` on a lot
pub fn lot_bid(lot: u64, bidder: Address) -> StateKey {
    StateKey::new("auction.lot.bid").arg(lot).arg(bidder)
}

/// Protocol switch for lot bidding
pub fn bid_on_lot_enabled() -> StateKey {
    StateKey::new("auction.settings.bid-on-lot-enabled")
}

// Node registration

/// Node is registered
pub fn node_exists(node: Address) -> StateKey {
    StateKey::new("node.exists").arg(node)
}

/// Protocol switch for new node registrations
pub fn node_registration_enabled() -> StateKey {
    StateKey::new("node.settings.registration-enabled")
}

/// Timezone a node registered with
pub fn node_timezone(node: Address) -> StateKey {
    StateKey::new("node.timezone-location").arg(node)
}

/// ETH held by an account
pub fn eth_balance(account: Address) -> StateKey {
    StateKey::new("account.eth.balance").arg(account)
}

// Deposits

/// Node has an open deposit reservation
pub fn deposit_reservation(node: Address) -> StateKey {
    StateKey::new("node.deposit.has-reservation").arg(node)
}

/// Staking duration of a node's reservation
pub fn deposit_reservation_duration(node: Address) -> StateKey {
    StateKey::new("node.deposit.reservation-duration").arg(node)
}

/// Protocol switch for node deposits
pub fn node_deposits_enabled() -> StateKey {
    StateKey::new("node.settings.deposit-allowed")
}

/// Validator public key is already registered
pub fn validator_pubkey_used(pubkey: &str) -> StateKey {
    StateKey::new("validator.pubkey.used").arg(pubkey.to_ascii_lowercase())
}

// Faucet

/// RPL held by the faucet
pub fn faucet_balance() -> StateKey {
    StateKey::new("faucet.balance")
}

/// RPL an account may still withdraw this period
pub fn faucet_allowance(account: Address) -> StateKey {
    StateKey::new("faucet.allowance").arg(account)
}

/// ETH fee charged per faucet withdrawal
pub fn faucet_withdrawal_fee() -> StateKey {
    StateKey::new("faucet.withdrawal-fee")
}

// Node staking and tokens

/// RPL staked by a node
pub fn rpl_stake(node: Address) -> StateKey {
    StateKey::new("node.rpl.stake").arg(node)
}

/// Minimum RPL stake for a node's minipools
pub fn minimum_rpl_stake(node: Address) -> StateKey {
    StateKey::new("node.rpl.minimum-stake").arg(node)
}

/// Block of the node's last RPL stake
pub fn rpl_staked_block(node: Address) -> StateKey {
    StateKey::new("node.rpl.staked-block").arg(node)
}

/// Blocks a stake must age before it can be withdrawn
pub fn withdrawal_delay() -> StateKey {
    StateKey::new("rewards.claim-interval-blocks")
}

/// New RPL token balance
pub fn rpl_balance(account: Address) -> StateKey {
    StateKey::new("token.rpl.balance").arg(account)
}

/// Legacy fixed-supply RPL balance
pub fn fixed_supply_rpl_balance(account: Address) -> StateKey {
    StateKey::new("token.fsrpl.balance").arg(account)
}

/// RPL `owner` has approved `spender` to pull
pub fn rpl_allowance(owner: Address, spender: Address) -> StateKey {
    StateKey::new("token.rpl.allowance").arg(owner).arg(spender)
}

/// Legacy RPL `owner` has approved `spender` to pull
pub fn fixed_supply_rpl_allowance(owner: Address, spender: Address) -> StateKey {
    StateKey::new("token.fsrpl.allowance").arg(owner).arg(spender)
}

/// Message attached to a proposal
pub fn proposal_message(id: u64) -> StateKey {
    StateKey::new("dao.proposal.message").arg(id)
}

// Minipools

/// Node that owns a minipool
pub fn minipool_owner(minipool: Address) -> StateKey {
    StateKey::new("minipool.owner").arg(minipool)
}

/// Minipool status code
pub fn minipool_status(minipool: Address) -> StateKey {
    StateKey::new("minipool.status").arg(minipool)
}

// Oracle DAO

/// Account is a member
pub fn odao_member(account: Address) -> StateKey {
    StateKey::new("odao.member").arg(account)
}

/// Time the account's invitation proposal was executed (0 = never)
pub fn odao_invite_executed(account: Address) -> StateKey {
    StateKey::new("odao.member.invite-executed-time").arg(account)
}

/// Time of the member's last proposal
pub fn odao_last_proposal_time(account: Address) -> StateKey {
    StateKey::new("odao.member.last-proposal-time").arg(account)
}

/// Member id
pub fn odao_member_id(account: Address) -> StateKey {
    StateKey::new("odao.member.id").arg(account)
}

/// Member email
pub fn odao_member_email(account: Address) -> StateKey {
    StateKey::new("odao.member.email").arg(account)
}

/// Number of members
pub fn odao_member_count() -> StateKey {
    StateKey::new("odao.member.count")
}

/// Members required before anyone may leave
pub fn odao_minimum_members() -> StateKey {
    StateKey::new("odao.settings.minimum-members")
}

/// RPL bond required to join
pub fn odao_rpl_bond() -> StateKey {
    StateKey::new("odao.settings.rpl-bond")
}

/// Seconds an executed invitation stays actionable
pub fn odao_action_window() -> StateKey {
    StateKey::new("odao.settings.action-time")
}

/// Seconds between proposals by one member
pub fn odao_proposal_cooldown() -> StateKey {
    StateKey::new("odao.settings.proposal-cooldown")
}

/// Number of proposals ever created
pub fn proposal_count() -> StateKey {
    StateKey::new("dao.proposal.count")
}

/// Proposal state code
pub fn proposal_state(id: u64) -> StateKey {
    StateKey::new("dao.proposal.state").arg(id)
}

/// Proposal author
pub fn proposal_proposer(id: u64) -> StateKey {
    StateKey::new("dao.proposal.proposer").arg(id)
}
