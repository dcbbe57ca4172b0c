//! Item definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Attributes, EntityId, Placement};
use crate::effects::Effect;
use crate::mechanics::SizeTier;

/// An object in the world, lying in a room or carried by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    /// Catalog object type this item was spawned from, if any.
    pub definition_id: Option<String>,
    pub name: String,
    pub description: String,
    pub attributes: Attributes,
    pub placement: Placement,
    /// Action name -> effects run when that action targets this item.
    pub interactions: BTreeMap<String, Vec<Effect>>,
    /// Verb -> canonical action name, offered to agents near this item.
    pub verb_aliases: BTreeMap<String, String>,
    /// Destroy reason once tombstoned. Tombstoned items are kept for audit.
    pub destroyed: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, placement: Placement) -> Self {
        Self {
            id: EntityId::new(),
            definition_id: None,
            name: name.into(),
            description: String::new(),
            attributes: Attributes::default(),
            placement,
            interactions: BTreeMap::new(),
            verb_aliases: BTreeMap::new(),
            destroyed: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn is_active(&self) -> bool {
        self.destroyed.is_none()
    }

    /// Case-insensitive name match.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// Size tier of the item itself; drives its carried weight.
    pub fn size(&self) -> Option<SizeTier> {
        self.attributes.text("size").and_then(SizeTier::parse)
    }

    /// Weight counted against an agent's capacity.
    pub fn weight(&self) -> u32 {
        SizeTier::weight_of(self.size())
    }

    /// Interaction effects for an action name or verb, case-insensitive.
    pub fn interaction(&self, verb: &str) -> Option<&[Effect]> {
        self.interactions
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(verb))
            .map(|(_, effects)| effects.as_slice())
    }
}
