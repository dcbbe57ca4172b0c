//! Inventory constraint checking.
//!
//! Checks run in a fixed order and the first failure wins:
//! immovability, size tier, class, level, custom constraints, capacity.
//! Capacity figures are always derived from the live item properties and
//! are never cached.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{Agent, EntityId, Item};
use crate::error::RulesError;
use crate::events::{Event, Scope};
use crate::mechanics::SizeTier;
use crate::value::PropertyValue;
use crate::world_state::World;

/// Capacity of an agent that declares none.
pub const DEFAULT_CAPACITY: u32 = 10;

/// Tags that pin an item in place.
pub const IMMOVABLE_TAGS: &[&str] = &["immovable", "fixed", "location_bound"];

/// Item property prefix for custom key/value constraints.
pub const CUSTOM_REQUIREMENT_PREFIX: &str = "require:";

/// Tunables for the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryRules {
    pub default_capacity: u32,
}

impl Default for InventoryRules {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Why an item may not be added, phrased for the agent and for onlookers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub reason: String,
    pub broadcast: String,
}

/// Result of [`can_add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Room-scoped event describing the failed attempt.
    pub broadcast: Option<Event>,
}

/// Total weight budget of an agent.
pub fn capacity_of(world: &World, agent: &Agent) -> u32 {
    agent
        .attributes
        .number("capacity")
        .map(|c| c.max(0.0) as u32)
        .unwrap_or(world.inventory_rules.default_capacity)
}

/// Weight currently carried by an agent.
pub fn capacity_used(world: &World, agent: EntityId) -> u32 {
    world.inventory_of(agent).iter().map(|item| item.weight()).sum()
}

/// Weight an agent can still take on.
pub fn capacity_available(world: &World, agent: &Agent) -> u32 {
    capacity_of(world, agent).saturating_sub(capacity_used(world, agent.id))
}

/// Run every check for moving `item` into `agent`'s inventory.
pub fn check(world: &World, item: &Item, agent: &Agent) -> Result<(), Refusal> {
    let name = &item.name;

    if IMMOVABLE_TAGS.iter().any(|t| item.attributes.has_tag(t)) {
        return Err(Refusal {
            reason: format!("The {} cannot be moved.", name),
            broadcast: format!("{} strains at the {}, but it will not budge.", agent.name, name),
        });
    }

    let stats = world
        .statuses
        .effective_properties(agent.id, &agent.attributes.properties);

    if let Some(required) = item.attributes.text("required_size").and_then(SizeTier::parse) {
        let own = text_of(&stats, "size")
            .and_then(SizeTier::parse)
            .unwrap_or_default();
        if own < required {
            return Err(Refusal {
                reason: format!(
                    "You are too small to carry the {}: you are {}, it requires {}.",
                    name, own, required
                ),
                broadcast: format!("{} tries to lift the {} but is too small.", agent.name, name),
            });
        }
    }

    if let Some(required) = item.attributes.text("required_class") {
        let matches = text_of(&stats, "class").is_some_and(|c| c.eq_ignore_ascii_case(required));
        if !matches {
            return Err(Refusal {
                reason: format!("Only a {} can take the {}.", required, name),
                broadcast: format!("{} reaches for the {}, but it resists them.", agent.name, name),
            });
        }
    }

    if let Some(required) = item.attributes.number("required_level") {
        let level = stats.get("level").and_then(PropertyValue::as_f64).unwrap_or(0.0);
        if level < required {
            return Err(Refusal {
                reason: format!(
                    "You must be level {} to take the {} (you are level {}).",
                    required, name, level
                ),
                broadcast: format!("{} fumbles with the {}.", agent.name, name),
            });
        }
    }

    for (key, expected) in &item.attributes.properties {
        let Some(stat) = key.strip_prefix(CUSTOM_REQUIREMENT_PREFIX) else {
            continue;
        };
        let satisfied = stats.get(stat).is_some_and(|actual| actual.loosely_equals(expected));
        if !satisfied {
            return Err(Refusal {
                reason: format!("The {} requires {} to be {}.", name, stat, expected),
                broadcast: format!("{} fails to claim the {}.", agent.name, name),
            });
        }
    }

    let capacity = capacity_of(world, agent);
    let used = capacity_used(world, agent.id);
    let weight = item.weight();
    if used + weight > capacity {
        return Err(Refusal {
            reason: format!(
                "You cannot carry the {}: it weighs {} and you have {} of {} capacity left.",
                name,
                weight,
                capacity.saturating_sub(used),
                capacity
            ),
            broadcast: format!("{} is carrying too much to pick up the {}.", agent.name, name),
        });
    }

    Ok(())
}

/// Decide whether `item` may join `agent`'s inventory. Refusals carry a
/// room-scoped event for onlookers.
pub fn can_add(world: &mut World, item: EntityId, agent: EntityId) -> Result<Admission, RulesError> {
    let item_ref = world.active_item(item).ok_or(RulesError::UnknownEntity(item))?;
    let agent_ref = world.agent(agent).ok_or(RulesError::UnknownEntity(agent))?;

    match check(world, item_ref, agent_ref) {
        Ok(()) => Ok(Admission {
            allowed: true,
            reason: None,
            broadcast: None,
        }),
        Err(refusal) => {
            let origin = agent_ref.location.clone();
            let event = world
                .event(refusal.broadcast, "inventory", origin, Scope::Room)
                .with_actor(agent)
                .with_related_item(item);
            Ok(Admission {
                allowed: false,
                reason: Some(refusal.reason),
                broadcast: Some(event),
            })
        }
    }
}

fn text_of<'a>(props: &'a BTreeMap<String, PropertyValue>, key: &str) -> Option<&'a str> {
    props.get(key).and_then(PropertyValue::as_str)
}
