//! # Game Rules
//!
//! The world model and the declarative rule machinery of the turn engine.
//! Requirement trees decide whether something may happen, effect lists say
//! what happens, and the inventory checker guards every item transfer.
//! This crate owns no turn loop and talks to no agents.

pub mod catalog;
pub mod effects;
pub mod entities;
pub mod error;
pub mod events;
pub mod functions;
pub mod inventory;
pub mod lifecycle;
pub mod mechanics;
pub mod requirements;
pub mod status;
pub mod value;
pub mod world_state;

pub use catalog::{ActionCategory, ActionDefinition, ApCost, Catalog, Motive, ObjectType, StatusPrompt};
pub use effects::{Effect, EffectContext, EffectOutcome};
pub use entities::*;
pub use error::RulesError;
pub use events::{Event, Scope, Timestamp};
pub use functions::{FunctionOutput, FunctionRegistry};
pub use mechanics::*;
pub use requirements::{Outcome, Params, RequirementNode};
pub use status::{StatusBook, StatusEffect};
pub use value::PropertyValue;
pub use world_state::*;
