//! Room definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Attributes, EntityId, RoomId};

/// A one-way connection to a neighbouring room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub direction: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub target: RoomId,
    /// Hidden exits exist for adjacency but cannot be used or seen.
    #[serde(default)]
    pub hidden: bool,
}

impl Exit {
    pub fn new(direction: impl Into<String>, target: RoomId) -> Self {
        Self {
            direction: direction.into(),
            aliases: Vec::new(),
            target,
            hidden: false,
        }
    }

    /// Case-insensitive match against the direction or any alias.
    pub fn answers_to(&self, word: &str) -> bool {
        let word = word.trim();
        self.direction.eq_ignore_ascii_case(word)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(word))
    }
}

/// A room. Connectivity is static; occupancy changes every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub exits: Vec<Exit>,
    pub attributes: Attributes,
    pub occupants: BTreeSet<EntityId>,
    pub items: BTreeSet<EntityId>,
}

impl Room {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RoomId::new(id),
            name: name.into(),
            description: String::new(),
            exits: Vec::new(),
            attributes: Attributes::default(),
            occupants: BTreeSet::new(),
            items: BTreeSet::new(),
        }
    }

    pub fn with_exit(mut self, exit: Exit) -> Self {
        self.exits.push(exit);
        self
    }

    /// A usable exit by direction or alias. Hidden exits are never returned.
    pub fn find_exit(&self, word: &str) -> Option<&Exit> {
        self.exits.iter().find(|e| !e.hidden && e.answers_to(word))
    }

    pub fn visible_exits(&self) -> impl Iterator<Item = &Exit> {
        self.exits.iter().filter(|e| !e.hidden)
    }

    /// Rooms one exit away, hidden exits included.
    pub fn neighbours(&self) -> impl Iterator<Item = &RoomId> {
        self.exits.iter().map(|e| &e.target)
    }
}
