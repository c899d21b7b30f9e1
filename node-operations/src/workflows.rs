//! Multi-step workflows

use crate::{node, odao};
use guard_core::WorkflowTemplate;

/// Approve the RPL bond, then join
pub const ODAO_JOIN: &str = "odao.join";
/// Approve legacy RPL, then swap it
pub const NODE_SWAP_RPL: &str = "node.swap-rpl";
/// Swap legacy RPL, then join with the proceeds
pub const ODAO_SWAP_AND_JOIN: &str = "odao.swap-and-join";

/// `odao.join`
pub fn odao_join() -> WorkflowTemplate {
    WorkflowTemplate::new(ODAO_JOIN)
        .step(odao::APPROVE_RPL_BOND)
        .then(odao::JOIN)
}

/// `node.swap-rpl`
pub fn node_swap_rpl() -> WorkflowTemplate {
    WorkflowTemplate::new(NODE_SWAP_RPL)
        .step(node::APPROVE_FIXED_SUPPLY_RPL)
        .then(node::SWAP_RPL)
}

/// `odao.swap-and-join`
pub fn odao_swap_and_join() -> WorkflowTemplate {
    WorkflowTemplate::new(ODAO_SWAP_AND_JOIN)
        .chain(&node_swap_rpl())
        .chain(&odao_join())
}
