//! Status effects: timed property modifiers attached to entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::EntityId;
use crate::mechanics::StackingPolicy;
use crate::value::PropertyValue;

/// A named modifier with an optional duration in turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    /// Remaining turns. `None` = never expires.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Property deltas overlaid on the entity's base properties.
    #[serde(default)]
    pub deltas: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub stacking: StackingPolicy,
}

impl StatusEffect {
    pub fn new(name: impl Into<String>, duration: Option<u32>) -> Self {
        Self {
            name: name.into(),
            duration,
            deltas: BTreeMap::new(),
            stacking: StackingPolicy::default(),
        }
    }

    pub fn with_delta(mut self, property: impl Into<String>, delta: impl Into<PropertyValue>) -> Self {
        self.deltas.insert(property.into(), delta.into());
        self
    }

    fn merge(&mut self, incoming: StatusEffect) {
        match incoming.stacking {
            StackingPolicy::Replace => *self = incoming,
            StackingPolicy::Refresh => {
                self.duration = incoming.duration;
                self.stacking = incoming.stacking;
            }
            StackingPolicy::Stack => {
                for (key, delta) in incoming.deltas {
                    let combined = self
                        .deltas
                        .get(&key)
                        .and_then(|current| current.checked_add(&delta))
                        .unwrap_or(delta);
                    self.deltas.insert(key, combined);
                }
                self.duration = match (self.duration, incoming.duration) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
                self.stacking = incoming.stacking;
            }
        }
    }
}

/// Active status effects per entity, keyed by effect name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusBook {
    effects: BTreeMap<EntityId, BTreeMap<String, StatusEffect>>,
}

impl StatusBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an effect. A same-named active effect is combined according to
    /// the incoming effect's stacking policy. Returns `true` on collision.
    pub fn apply(&mut self, entity: EntityId, effect: StatusEffect) -> bool {
        let slot = self.effects.entry(entity).or_default();
        match slot.get_mut(&effect.name) {
            Some(existing) => {
                existing.merge(effect);
                true
            }
            None => {
                slot.insert(effect.name.clone(), effect);
                false
            }
        }
    }

    /// Remove an effect by name. Returns `true` if it was active.
    pub fn remove(&mut self, entity: EntityId, name: &str) -> bool {
        self.effects
            .get_mut(&entity)
            .is_some_and(|slot| slot.remove(name).is_some())
    }

    pub fn has(&self, entity: EntityId, name: &str) -> bool {
        self.effects
            .get(&entity)
            .is_some_and(|slot| slot.contains_key(name))
    }

    pub fn active(&self, entity: EntityId) -> Vec<&StatusEffect> {
        self.effects
            .get(&entity)
            .map(|slot| slot.values().collect())
            .unwrap_or_default()
    }

    /// One turn passes for `entity`: durations tick down and effects reaching
    /// zero are removed. Returns the names of the expired effects.
    pub fn advance(&mut self, entity: EntityId) -> Vec<String> {
        let Some(slot) = self.effects.get_mut(&entity) else {
            return Vec::new();
        };
        let mut expired = Vec::new();
        slot.retain(|name, effect| match effect.duration.as_mut() {
            None => true,
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push(name.clone());
                    false
                } else {
                    true
                }
            }
        });
        expired
    }

    /// Advance every entity that carries effects.
    pub fn advance_all(&mut self) -> BTreeMap<EntityId, Vec<String>> {
        let entities: Vec<EntityId> = self.effects.keys().copied().collect();
        entities
            .into_iter()
            .map(|id| (id, self.advance(id)))
            .filter(|(_, expired)| !expired.is_empty())
            .collect()
    }

    /// Overlay all active deltas on `base`. Numbers add to numbers; any other
    /// pairing replaces the base value.
    pub fn effective_properties(
        &self,
        entity: EntityId,
        base: &BTreeMap<String, PropertyValue>,
    ) -> BTreeMap<String, PropertyValue> {
        let mut out = base.clone();
        for effect in self.active(entity) {
            for (key, delta) in &effect.deltas {
                let combined = overlay(out.get(key), delta);
                out.insert(key.clone(), combined);
            }
        }
        out
    }

    /// [`Self::effective_properties`] for a single key.
    pub fn effective_property(
        &self,
        entity: EntityId,
        key: &str,
        base: Option<&PropertyValue>,
    ) -> Option<PropertyValue> {
        self.active(entity)
            .iter()
            .filter_map(|effect| effect.deltas.get(key))
            .fold(base.cloned(), |current, delta| Some(overlay(current.as_ref(), delta)))
    }

    /// Drop every effect of an entity (used when it is destroyed).
    pub fn clear(&mut self, entity: EntityId) {
        self.effects.remove(&entity);
    }
}

fn overlay(current: Option<&PropertyValue>, delta: &PropertyValue) -> PropertyValue {
    match current {
        Some(current) if current.is_numeric() && delta.is_numeric() => {
            current.checked_add(delta).unwrap_or_else(|| delta.clone())
        }
        _ => delta.clone(),
    }
}
