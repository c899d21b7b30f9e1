//! Genesis state
//!
//! ```toml
//! [[state]]
//! key = "auction.lot.count"
//! value = { kind = "uint", value = 3 }
//! ```

use crate::error::{Error, Result};
use crate::state::ChainState;
use crate::Config;
use guard_core::{StateKey, StateValue};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One seeded value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisEntry {
    /// State key
    pub key: StateKey,
    /// Initial value
    pub value: StateValue,
}

/// Initial ledger state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Seeded values
    #[serde(default)]
    pub state: Vec<GenesisEntry>,
}

impl Genesis {
    /// Empty genesis
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entry
    pub fn with(mut self, key: StateKey, value: impl Into<StateValue>) -> Self {
        self.state.push(GenesisEntry {
            key,
            value: value.into(),
        });
        self
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Build the chain state; later entries win
    pub fn into_state(self, config: &Config) -> ChainState {
        let mut state = ChainState::new(config.genesis_block, config.genesis_timestamp);
        for entry in self.state {
            state.set(entry.key, entry.value);
        }
        state
    }
}

impl FromStr for Genesis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Genesis(format!("Failed to parse genesis: {}", e)))
    }
}
