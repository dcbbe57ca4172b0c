//! Item lifecycle: spawning from catalog templates, tombstoning, cloning.
//!
//! Destroyed items are never removed from the world. They keep their data
//! for the audit trail and simply stop showing up in active queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::catalog::Catalog;
use crate::entities::{EntityId, Item, Placement, RoomId};
use crate::error::RulesError;
use crate::events::{Event, Scope, Timestamp};
use crate::value::PropertyValue;
use crate::world_state::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Spawned,
    Destroyed,
    Cloned,
}

/// One entry of the lifecycle audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: Timestamp,
    pub action: AuditAction,
    pub entity: EntityId,
    pub detail: String,
}

impl World {
    /// Create a new item from an object type and place it.
    ///
    /// `props` override the template's properties. Returns the new id and a
    /// narrator-scoped audit event.
    pub fn spawn(
        &mut self,
        catalog: &Catalog,
        definition: &str,
        placement: Placement,
        props: BTreeMap<String, PropertyValue>,
    ) -> Result<(EntityId, Event), RulesError> {
        let template = catalog.object_type(definition)?;
        let mut item = template.instantiate(placement.clone());
        item.attributes.properties.extend(props);

        let name = item.name.clone();
        let id = self.add_item(item)?;
        let origin = self.room_of(&placement)?;

        self.audit(AuditAction::Spawned, id, format!("{} from `{}`", name, definition));
        debug!(item = %id, definition, "spawned item");

        let event = self
            .event(format!("{} appears.", name), "lifecycle", origin, Scope::Narrator)
            .with_related_item(id);
        Ok((id, event))
    }

    /// Tombstone an item. Returns `false` if it is unknown or already destroyed.
    pub fn destroy(&mut self, id: EntityId, reason: &str) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        if item.destroyed.is_some() {
            return false;
        }
        item.destroyed = Some(reason.to_string());
        let placement = item.placement.clone();

        self.detach(id, &placement);
        self.statuses.clear(id);
        self.audit(AuditAction::Destroyed, id, reason.to_string());
        debug!(item = %id, reason, "destroyed item");
        true
    }

    /// Duplicate an active item's current state under a new identity,
    /// optionally at a different placement.
    pub fn clone_item(
        &mut self,
        id: EntityId,
        new_placement: Option<Placement>,
    ) -> Result<EntityId, RulesError> {
        let source = self.items.get(&id).ok_or(RulesError::UnknownEntity(id))?;
        if source.destroyed.is_some() {
            return Err(RulesError::SourceDestroyed(id));
        }

        let mut copy: Item = source.clone();
        copy.id = EntityId::new();
        if let Some(placement) = new_placement {
            copy.placement = placement;
        }
        let new_id = self.add_item(copy)?;
        self.audit(AuditAction::Cloned, new_id, format!("cloned from {}", id));
        Ok(new_id)
    }

    /// The room a placement ultimately sits in.
    pub fn room_of(&self, placement: &Placement) -> Result<RoomId, RulesError> {
        match placement {
            Placement::Room(room) => Ok(room.clone()),
            Placement::Agent(agent) => self
                .agent(*agent)
                .map(|a| a.location.clone())
                .ok_or(RulesError::UnknownEntity(*agent)),
        }
    }

    fn audit(&mut self, action: AuditAction, entity: EntityId, detail: String) {
        self.audit_log.push(AuditRecord {
            timestamp: self.clock,
            action,
            entity,
            detail,
        });
    }
}
