//! Scoped event delivery.
//!
//! Events are published into a pending queue and delivered on [`flush`].
//! Observers are computed from the scope token against the world as it is
//! at flush time, not as it was when the event was created.
//!
//! [`flush`]: EventDistributor::flush

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use game_rules::{EntityId, Event, RoomId, Scope, World};

#[derive(Debug, Default)]
pub struct EventDistributor {
    pending: Vec<Event>,
    queues: BTreeMap<EntityId, Vec<Event>>,
    /// Every flushed event, in delivery order.
    narrator_log: Vec<Event>,
}

impl EventDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: Event) {
        self.pending.push(event);
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = Event>) {
        self.pending.extend(events);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliver every pending event. Returns the number of agent deliveries.
    pub fn flush(&mut self, world: &World) -> usize {
        let mut deliveries = 0;
        for event in std::mem::take(&mut self.pending) {
            let observers = observers(world, &event);
            debug!(
                sequence = event.sequence,
                scope = ?event.scope,
                observers = observers.len(),
                "delivering event"
            );
            for agent in observers {
                self.queues.entry(agent).or_default().push(event.clone());
                deliveries += 1;
            }
            self.narrator_log.push(event);
        }
        deliveries
    }

    /// Take an agent's queued events, leaving the queue empty.
    pub fn drain(&mut self, agent: EntityId) -> Vec<Event> {
        self.queues.remove(&agent).unwrap_or_default()
    }

    pub fn queued(&self, agent: EntityId) -> &[Event] {
        self.queues.get(&agent).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn narrator_log(&self) -> &[Event] {
        &self.narrator_log
    }

    /// Events delivered but never drained, per agent.
    pub fn undelivered(&self) -> BTreeMap<EntityId, Vec<Event>> {
        self.queues
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(agent, events)| (*agent, events.clone()))
            .collect()
    }
}

/// Agents that should see `event`, given current occupancy.
pub fn observers(world: &World, event: &Event) -> BTreeSet<EntityId> {
    match event.scope {
        Scope::SelfOnly => event
            .actor
            .filter(|actor| world.agent(*actor).is_some())
            .into_iter()
            .collect(),
        Scope::Room => in_rooms(world, std::iter::once(event.origin.clone())),
        Scope::Adjacent => {
            let mut rooms = world.adjacent_rooms(&event.origin);
            rooms.insert(event.origin.clone());
            in_rooms(world, rooms)
        }
        Scope::Global => world.agents.keys().copied().collect(),
        Scope::Narrator => BTreeSet::new(),
    }
}

fn in_rooms(world: &World, rooms: impl IntoIterator<Item = RoomId>) -> BTreeSet<EntityId> {
    rooms
        .into_iter()
        .flat_map(|room| world.agents_in_room(&room).into_iter().map(|a| a.id).collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_rules::{Agent, Exit, Room};

    struct Town {
        world: World,
        ada: EntityId,
        ben: EntityId,
        cy: EntityId,
        dee: EntityId,
    }

    /// square <-> alley (visible), square -> cellar (hidden), docks unconnected.
    fn town() -> Town {
        let mut world = World::new();
        let mut trapdoor = Exit::new("down", RoomId::new("cellar"));
        trapdoor.hidden = true;
        world.add_room(
            Room::new("square", "Square")
                .with_exit(Exit::new("east", RoomId::new("alley")))
                .with_exit(trapdoor),
        );
        world.add_room(Room::new("alley", "Alley").with_exit(Exit::new("west", RoomId::new("square"))));
        world.add_room(Room::new("cellar", "Cellar"));
        world.add_room(Room::new("docks", "Docks"));

        let ada = world.add_agent(Agent::new("Ada", RoomId::new("square"))).unwrap();
        let ben = world.add_agent(Agent::new("Ben", RoomId::new("square"))).unwrap();
        let cy = world.add_agent(Agent::new("Cy", RoomId::new("cellar"))).unwrap();
        let dee = world.add_agent(Agent::new("Dee", RoomId::new("docks"))).unwrap();
        Town { world, ada, ben, cy, dee }
    }

    fn emit(town: &mut Town, scope: Scope) -> Event {
        town.world
            .event("something happens", "test", RoomId::new("square"), scope)
            .with_actor(town.ada)
    }

    #[test]
    fn test_self_scope_excludes_co_located_agents() {
        let mut town = town();
        let mut distributor = EventDistributor::new();
        let event = emit(&mut town, Scope::SelfOnly);
        distributor.publish(event);
        distributor.flush(&town.world);

        assert_eq!(distributor.queued(town.ada).len(), 1);
        assert!(distributor.queued(town.ben).is_empty());
        assert!(distributor.queued(town.cy).is_empty());
    }

    #[test]
    fn test_scopes_resolve_observers() {
        let mut town = town();
        let events: Vec<Event> = [Scope::Room, Scope::Adjacent, Scope::Global, Scope::Narrator]
            .into_iter()
            .map(|scope| emit(&mut town, scope))
            .collect();
        let [room, adjacent, global, narrator] = [0, 1, 2, 3].map(|i| observers(&town.world, &events[i]));

        assert_eq!(room, BTreeSet::from([town.ada, town.ben]));
        // The hidden trapdoor still counts for adjacency.
        assert_eq!(adjacent, BTreeSet::from([town.ada, town.ben, town.cy]));
        assert_eq!(global.len(), 4);
        assert!(global.contains(&town.dee));
        assert!(narrator.is_empty());
    }

    #[test]
    fn test_observers_use_occupancy_at_flush_time() {
        let mut town = town();
        let mut distributor = EventDistributor::new();
        let event = emit(&mut town, Scope::Room);
        distributor.publish(event);

        town.world.move_agent(town.ben, &RoomId::new("docks")).unwrap();
        town.world.move_agent(town.dee, &RoomId::new("square")).unwrap();
        distributor.flush(&town.world);

        assert!(distributor.queued(town.ben).is_empty());
        assert_eq!(distributor.queued(town.dee).len(), 1);
    }

    #[test]
    fn test_drain_clears_once_and_undelivered_is_kept() {
        let mut town = town();
        let mut distributor = EventDistributor::new();
        let first = emit(&mut town, Scope::Global);
        let second = emit(&mut town, Scope::Global);
        distributor.publish_all([first, second]);
        assert_eq!(distributor.pending_len(), 2);
        assert_eq!(distributor.flush(&town.world), 8);

        let drained = distributor.drain(town.ada);
        assert_eq!(drained.len(), 2);
        assert!(drained[0].sequence < drained[1].sequence);
        assert!(distributor.drain(town.ada).is_empty());

        let undelivered = distributor.undelivered();
        assert!(!undelivered.contains_key(&town.ada));
        assert_eq!(undelivered[&town.cy].len(), 2);
        assert_eq!(distributor.narrator_log().len(), 2);
    }
}
