//! Named host functions that catalog data can refer to.
//!
//! Actions name dynamic AP costs and `invoke` effects by string; the
//! registry maps those names to code. It also carries the optional decision
//! hook for requirement kinds the evaluator does not understand.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::entities::{Agent, EntityId};
use crate::error::RulesError;
use crate::events::{Event, Scope};
use crate::requirements::{object_parameter, resolve_named, EntityRef, Fallback, Params};
use crate::value::PropertyValue;
use crate::world_state::World;

/// Arguments given to an `invoke` effect.
pub type Args = BTreeMap<String, PropertyValue>;

/// What an effect function produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionOutput {
    pub events: Vec<Event>,
    pub feedback: Vec<String>,
}

pub type CostFn = Box<dyn Fn(&World, &Agent, &Params) -> u32>;
pub type EffectFn = Box<dyn Fn(&mut World, EntityId, &Params, &Args) -> Result<FunctionOutput, RulesError>>;
pub type RequirementFn = Box<dyn Fn(&str, &Value, &Agent, &World, &Params) -> Option<bool>>;

pub struct FunctionRegistry {
    costs: BTreeMap<String, CostFn>,
    effects: BTreeMap<String, EffectFn>,
    requirement_fallback: Option<RequirementFn>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("costs", &self.costs.keys().collect::<Vec<_>>())
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .field("requirement_fallback", &self.requirement_fallback.is_some())
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            costs: BTreeMap::new(),
            effects: BTreeMap::new(),
            requirement_fallback: None,
        }
    }

    /// A registry preloaded with the built-in functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_cost("item_weight", item_weight_cost);
        registry.register_effect("reveal_exits", reveal_exits);
        registry
    }

    pub fn register_cost<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&World, &Agent, &Params) -> u32 + 'static,
    {
        self.costs.insert(name.into(), Box::new(f));
    }

    pub fn register_effect<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut World, EntityId, &Params, &Args) -> Result<FunctionOutput, RulesError> + 'static,
    {
        self.effects.insert(name.into(), Box::new(f));
    }

    pub fn register_requirement_fallback<F>(&mut self, f: F)
    where
        F: Fn(&str, &Value, &Agent, &World, &Params) -> Option<bool> + 'static,
    {
        self.requirement_fallback = Some(Box::new(f));
    }

    pub fn cost(&self, name: &str, world: &World, agent: &Agent, params: &Params) -> Result<u32, RulesError> {
        let f = self
            .costs
            .get(name)
            .ok_or_else(|| RulesError::UnknownFunction(name.to_string()))?;
        Ok(f(world, agent, params))
    }

    pub fn invoke(
        &self,
        name: &str,
        world: &mut World,
        agent: EntityId,
        params: &Params,
        args: &Args,
    ) -> Result<FunctionOutput, RulesError> {
        let f = self
            .effects
            .get(name)
            .ok_or_else(|| RulesError::UnknownFunction(name.to_string()))?;
        f(world, agent, params, args)
    }

    /// The registered decision hook for unknown requirement kinds.
    pub fn fallback(&self) -> Option<Fallback<'_>> {
        match &self.requirement_fallback {
            Some(f) => Some(f.as_ref()),
            None => None,
        }
    }
}

/// Weight of the named object, never less than one.
fn item_weight_cost(world: &World, agent: &Agent, params: &Params) -> u32 {
    object_parameter(params)
        .and_then(|name| match resolve_named(agent, world, name) {
            Some(EntityRef::Item(item)) => Some(item.weight()),
            _ => None,
        })
        .unwrap_or(1)
        .max(1)
}

/// Make every hidden exit of the agent's room visible.
fn reveal_exits(
    world: &mut World,
    agent: EntityId,
    _params: &Params,
    args: &Args,
) -> Result<FunctionOutput, RulesError> {
    let location = world
        .agent(agent)
        .map(|a| a.location.clone())
        .ok_or(RulesError::UnknownEntity(agent))?;
    let room = world
        .room_mut(&location)
        .ok_or_else(|| RulesError::UnknownRoom(location.to_string()))?;

    let mut revealed = Vec::new();
    for exit in room.exits.iter_mut().filter(|e| e.hidden) {
        exit.hidden = false;
        revealed.push(exit.direction.clone());
    }

    let mut output = FunctionOutput::default();
    if revealed.is_empty() {
        output.feedback.push("You find nothing hidden here.".to_string());
        return Ok(output);
    }
    let message = args
        .get("message")
        .and_then(PropertyValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("A hidden way opens: {}.", revealed.join(", ")));
    output.events.push(
        world
            .event(message, "discovery", location, Scope::Room)
            .with_actor(agent),
    );
    Ok(output)
}
