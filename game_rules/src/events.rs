//! Perceptual events produced by effects and delivered to observers.

use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, RoomId};

/// Who gets to perceive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the originating agent.
    #[serde(rename = "self")]
    SelfOnly,
    /// Agents in the origin room.
    #[default]
    Room,
    /// Agents in the origin room and in rooms one exit away.
    Adjacent,
    /// Every agent in the world.
    Global,
    /// No agent; recorded in the narrator log.
    Narrator,
}

/// Game-clock position of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub round: u32,
    pub turn: u32,
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number, unique per world.
    pub sequence: u64,
    pub message: String,
    pub category: String,
    pub origin: RoomId,
    pub timestamp: Timestamp,
    pub actor: Option<EntityId>,
    pub related_item: Option<EntityId>,
    pub related_agent: Option<EntityId>,
    pub scope: Scope,
}

impl Event {
    pub fn with_actor(mut self, actor: EntityId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_related_item(mut self, item: EntityId) -> Self {
        self.related_item = Some(item);
        self
    }

    pub fn with_related_agent(mut self, agent: EntityId) -> Self {
        self.related_agent = Some(agent);
        self
    }
}
