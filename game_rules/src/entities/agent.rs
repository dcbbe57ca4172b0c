//! Agent definitions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Attributes, EntityId, RoomId};
use crate::error::RulesError;

/// Tag prefix counted by [`Agent::evidence_count`].
pub const EVIDENCE_TAG_PREFIX: &str = "evidence:";

/// A participant controlling one character for the duration of a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: EntityId,
    pub name: String,
    /// Catalog character type this agent was created from, if any.
    pub character_type: Option<String>,
    pub location: RoomId,
    pub action_points: u32,
    pub attributes: Attributes,
    pub inventory: BTreeSet<EntityId>,
    pub motive: Option<MotiveBinding>,
}

/// The motive bound to an agent plus the progress memo for its success tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotiveBinding {
    pub motive_id: String,
    /// Leaf key -> last observed truth value.
    pub progress_memo: BTreeMap<String, bool>,
}

impl Agent {
    /// Create a new agent standing in the given room.
    pub fn new(name: impl Into<String>, location: RoomId) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            character_type: None,
            location,
            action_points: 0,
            attributes: Attributes::default(),
            inventory: BTreeSet::new(),
            motive: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.attributes.has_tag(tag)
    }

    /// Bind a motive. A motive is bound once per game and never re-rolled.
    pub fn bind_motive(&mut self, motive_id: impl Into<String>) -> Result<(), RulesError> {
        if let Some(existing) = &self.motive {
            return Err(RulesError::MotiveAlreadyBound {
                agent: self.name.clone(),
                motive: existing.motive_id.clone(),
            });
        }
        self.motive = Some(MotiveBinding {
            motive_id: motive_id.into(),
            progress_memo: BTreeMap::new(),
        });
        Ok(())
    }

    pub fn motive_id(&self) -> Option<&str> {
        self.motive.as_ref().map(|m| m.motive_id.as_str())
    }

    /// Deduct `cost` action points. Returns `false` (and deducts nothing) if
    /// the balance is insufficient.
    pub fn spend_action_points(&mut self, cost: u32) -> bool {
        match self.action_points.checked_sub(cost) {
            Some(rest) => {
                self.action_points = rest;
                true
            }
            None => false,
        }
    }

    /// Reset the balance to the per-round allotment. Nothing carries over.
    pub fn reset_action_points(&mut self, allotment: u32) {
        self.action_points = allotment;
    }

    /// Number of `evidence:*` tags the agent holds.
    pub fn evidence_count(&self) -> usize {
        self.attributes
            .tags
            .iter()
            .filter(|t| t.starts_with(EVIDENCE_TAG_PREFIX))
            .count()
    }
}
