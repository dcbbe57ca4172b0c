//! Error types for the rules crate.

use crate::entities::EntityId;

/// Errors raised while loading content or mutating the world.
///
/// Requirement failures and inventory refusals are ordinary outcomes and
/// never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid requirement in {context}: {reason}")]
    InvalidRequirement { context: String, reason: String },

    #[error("{context} lists {count} conditions without an explicit `and`/`or`")]
    MissingCombinator { context: String, count: usize },

    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },

    #[error("unknown {kind} `{id}`")]
    UnknownDefinition { kind: &'static str, id: String },

    #[error("action `{action}` references undeclared parameter `{parameter}`")]
    UnknownParameter { action: String, parameter: String },

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("unknown room `{0}`")]
    UnknownRoom(String),

    #[error("cannot clone destroyed entity {0}")]
    SourceDestroyed(EntityId),

    #[error("no function registered under `{0}`")]
    UnknownFunction(String),

    #[error("could not resolve target `{0}`")]
    UnresolvedTarget(String),

    #[error("{agent} already has motive `{motive}` bound")]
    MotiveAlreadyBound { agent: String, motive: String },

    #[error("{0}")]
    Effect(String),
}
