//! Engine-level errors.

use game_rules::{EntityId, RulesError};

/// Errors that stop the engine from setting up or running a game.
///
/// Bad commands never surface here; they are reported back to the agent.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse engine config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("agent {0} is not part of this game")]
    UnknownAgent(EntityId),

    #[error(transparent)]
    Rules(#[from] RulesError),
}
