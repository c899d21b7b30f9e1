//! # Node Operations
//!
//! The operation catalogue for a staking node: registration, auction lots,
//! RPL staking, deposits, minipools, the faucet and the oracle DAO. Each operation is a set of precondition
//! checks plus, where the submission needs it, derived parameters and a
//! compose step.
//!
//! ```no_run
//! # fn main() -> guard_core::Result<()> {
//! let registry = node_operations::registry()?;
//! assert!(registry.operation("odao.join").is_ok());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod auction;
pub mod deposit;
pub mod faucet;
pub mod keys;
pub mod minipool;
pub mod node;
pub mod odao;
pub mod requirements;
pub mod workflows;

use guard_core::{OperationRegistry, Result};

/// Registry with every catalogued operation and workflow
pub fn registry() -> Result<OperationRegistry> {
    let mut registry = OperationRegistry::new();

    for def in [
        auction::bid_lot(),
        auction::claim_lot(),
        node::register(),
        node::withdraw_rpl(),
        node::approve_fixed_supply_rpl(),
        node::swap_rpl(),
        faucet::withdraw_rpl(),
        deposit::reserve(),
        minipool::close(),
        odao::approve_rpl_bond(),
        odao::join(),
        odao::propose_invite(),
        odao::propose_leave(),
        odao::cancel_proposal(),
        odao::propose_setting(),
    ] {
        registry.register(def)?;
    }

    registry.register_workflow(workflows::odao_join())?;
    registry.register_workflow(workflows::node_swap_rpl())?;
    registry.register_workflow(workflows::odao_swap_and_join())?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds() {
        let registry = registry().unwrap();
        assert_eq!(registry.operation_names().count(), 15);
        assert_eq!(registry.workflow_names().count(), 3);
        assert!(registry.operation("odao.leave").is_err());
    }
}
