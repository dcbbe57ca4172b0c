//! Engine configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use game_rules::inventory::InventoryRules;

use crate::error::EngineError;

/// Tunables of a game. Every field has a default, so an empty document is valid.
///
/// ```toml
/// command_marker = ">"
/// ap_per_round = 3
/// max_rounds = 20
/// pass_commands = ["pass", "quit"]
///
/// [inventory]
/// default_capacity = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix that marks a line as a command.
    pub command_marker: String,

    /// AP granted to every agent at the start of each round.
    pub ap_per_round: u32,

    /// Rounds played by [`crate::Game::run`].
    pub max_rounds: u32,

    pub inventory: InventoryRules,

    /// Words that end the agent's turn early.
    pub pass_commands: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_marker: ">".to_string(),
            ap_per_round: 3,
            max_rounds: 20,
            inventory: InventoryRules::default(),
            pass_commands: vec!["pass".to_string(), "quit".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.command_marker.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "command_marker must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
