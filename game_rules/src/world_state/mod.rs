//! World state management - the central structure holding all live game data.
//!
//! Entities reference each other by id only. Rooms know their occupants and
//! items, agents know their inventory, items know their placement; the
//! mutators here keep those three views consistent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::entities::{Agent, EntityId, Item, Placement, Room, RoomId};
use crate::error::RulesError;
use crate::events::{Event, Scope, Timestamp};
use crate::inventory::InventoryRules;
use crate::lifecycle::AuditRecord;
use crate::status::StatusBook;

/// The complete live state of the game world.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct World {
    /// Current round and turn.
    pub clock: Timestamp,

    pub rooms: BTreeMap<RoomId, Room>,

    /// All agents, including ones that no longer act.
    pub agents: BTreeMap<EntityId, Agent>,

    /// Fixed per-round acting order.
    pub turn_order: Vec<EntityId>,

    /// All items, tombstoned ones included.
    pub items: BTreeMap<EntityId, Item>,

    /// Active status effects per entity.
    pub statuses: StatusBook,

    /// Spawn/destroy/clone history.
    pub audit_log: Vec<AuditRecord>,

    /// Capacity defaults used by the inventory checker.
    pub inventory_rules: InventoryRules,

    next_sequence: u64,
}

impl World {
    /// Create a new empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a room to the world.
    pub fn add_room(&mut self, room: Room) -> RoomId {
        let id = room.id.clone();
        self.rooms.insert(id.clone(), room);
        id
    }

    /// Add an agent to the world, placing it in its room and at the end of the turn order.
    pub fn add_agent(&mut self, agent: Agent) -> Result<EntityId, RulesError> {
        let id = agent.id;
        let room = self
            .rooms
            .get_mut(&agent.location)
            .ok_or_else(|| RulesError::UnknownRoom(agent.location.to_string()))?;
        room.occupants.insert(id);
        self.turn_order.push(id);
        self.agents.insert(id, agent);
        Ok(id)
    }

    /// Add an item to the world at its placement.
    pub fn add_item(&mut self, item: Item) -> Result<EntityId, RulesError> {
        let id = item.id;
        match &item.placement {
            Placement::Room(room_id) => {
                self.rooms
                    .get_mut(room_id)
                    .ok_or_else(|| RulesError::UnknownRoom(room_id.to_string()))?
                    .items
                    .insert(id);
            }
            Placement::Agent(agent_id) => {
                self.agents
                    .get_mut(agent_id)
                    .ok_or(RulesError::UnknownEntity(*agent_id))?
                    .inventory
                    .insert(id);
            }
        }
        self.items.insert(id, item);
        Ok(id)
    }

    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Item by id, tombstoned or not.
    pub fn item(&self, id: EntityId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: EntityId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    /// Item by id, excluding tombstoned items.
    pub fn active_item(&self, id: EntityId) -> Option<&Item> {
        self.items.get(&id).filter(|i| i.is_active())
    }

    /// Agents currently standing in a room.
    pub fn agents_in_room(&self, room: &RoomId) -> Vec<&Agent> {
        self.rooms
            .get(room)
            .map(|r| r.occupants.iter().filter_map(|id| self.agents.get(id)).collect())
            .unwrap_or_default()
    }

    /// Active items lying in a room.
    pub fn items_in_room(&self, room: &RoomId) -> Vec<&Item> {
        self.rooms
            .get(room)
            .map(|r| r.items.iter().filter_map(|id| self.active_item(*id)).collect())
            .unwrap_or_default()
    }

    /// Active items carried by an agent.
    pub fn inventory_of(&self, agent: EntityId) -> Vec<&Item> {
        self.agents
            .get(&agent)
            .map(|a| a.inventory.iter().filter_map(|id| self.active_item(*id)).collect())
            .unwrap_or_default()
    }

    /// Find an active item in a room by case-insensitive name.
    pub fn find_room_item(&self, room: &RoomId, name: &str) -> Option<&Item> {
        self.items_in_room(room).into_iter().find(|i| i.matches_name(name))
    }

    /// Find an active item in an agent's inventory by case-insensitive name.
    pub fn find_inventory_item(&self, agent: EntityId, name: &str) -> Option<&Item> {
        self.inventory_of(agent).into_iter().find(|i| i.matches_name(name))
    }

    /// Find an item the agent can see: the room first, then the inventory.
    pub fn find_visible_item(&self, agent: &Agent, name: &str) -> Option<&Item> {
        self.find_room_item(&agent.location, name)
            .or_else(|| self.find_inventory_item(agent.id, name))
    }

    /// Find an agent standing in a room by case-insensitive name.
    pub fn find_agent_in_room(&self, room: &RoomId, name: &str) -> Option<&Agent> {
        self.agents_in_room(room)
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Rooms one exit away from `room`, hidden exits included.
    pub fn adjacent_rooms(&self, room: &RoomId) -> BTreeSet<RoomId> {
        self.rooms
            .get(room)
            .map(|r| r.neighbours().cloned().collect())
            .unwrap_or_default()
    }

    /// Move an agent into another room, updating both rooms' occupant sets.
    pub fn move_agent(&mut self, agent_id: EntityId, to: &RoomId) -> Result<(), RulesError> {
        if !self.rooms.contains_key(to) {
            return Err(RulesError::UnknownRoom(to.to_string()));
        }
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(RulesError::UnknownEntity(agent_id))?;
        let from = std::mem::replace(&mut agent.location, to.clone());
        if let Some(room) = self.rooms.get_mut(&from) {
            room.occupants.remove(&agent_id);
        }
        if let Some(room) = self.rooms.get_mut(to) {
            room.occupants.insert(agent_id);
        }
        Ok(())
    }

    /// Move an item to a new placement, updating the old and new containers.
    pub fn transfer_item(&mut self, item_id: EntityId, to: Placement) -> Result<(), RulesError> {
        match &to {
            Placement::Room(room) if !self.rooms.contains_key(room) => {
                return Err(RulesError::UnknownRoom(room.to_string()));
            }
            Placement::Agent(agent) if !self.agents.contains_key(agent) => {
                return Err(RulesError::UnknownEntity(*agent));
            }
            _ => {}
        }
        let item = self
            .items
            .get_mut(&item_id)
            .ok_or(RulesError::UnknownEntity(item_id))?;
        let from = std::mem::replace(&mut item.placement, to.clone());
        self.detach(item_id, &from);
        match to {
            Placement::Room(room) => {
                if let Some(room) = self.rooms.get_mut(&room) {
                    room.items.insert(item_id);
                }
            }
            Placement::Agent(agent) => {
                if let Some(agent) = self.agents.get_mut(&agent) {
                    agent.inventory.insert(item_id);
                }
            }
        }
        Ok(())
    }

    /// Remove an item id from the container named by `placement`.
    pub(crate) fn detach(&mut self, item_id: EntityId, placement: &Placement) {
        match placement {
            Placement::Room(room) => {
                if let Some(room) = self.rooms.get_mut(room) {
                    room.items.remove(&item_id);
                }
            }
            Placement::Agent(agent) => {
                if let Some(agent) = self.agents.get_mut(agent) {
                    agent.inventory.remove(&item_id);
                }
            }
        }
    }

    /// Build a stamped event originating in `origin`.
    pub fn event(
        &mut self,
        message: impl Into<String>,
        category: impl Into<String>,
        origin: RoomId,
        scope: Scope,
    ) -> Event {
        self.next_sequence += 1;
        Event {
            sequence: self.next_sequence,
            message: message.into(),
            category: category.into(),
            origin,
            timestamp: self.clock,
            actor: None,
            related_item: None,
            related_agent: None,
            scope,
        }
    }

    /// Carry over event numbering from a discarded staging copy so
    /// sequence numbers stay unique.
    pub(crate) fn adopt_sequence(&mut self, staged: &World) {
        self.next_sequence = self.next_sequence.max(staged.next_sequence);
    }

    /// Start a new round: the turn counter restarts at zero.
    pub fn begin_round(&mut self, round: u32) {
        self.clock = Timestamp { round, turn: 0 };
    }

    /// Advance the turn counter within the current round.
    pub fn advance_turn(&mut self) {
        self.clock.turn += 1;
    }
}
