//! Agent-facing turn prompts.

use serde::{Deserialize, Serialize};

use game_rules::inventory::{capacity_available, capacity_used};
use game_rules::{ActionCategory, ActionDefinition, ApCost, Catalog, EntityId, Event, World};

use crate::motive::MotiveTracker;

/// One available action as shown to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLine {
    /// Command format, e.g. `> pickup <object_name>`.
    pub usage: String,
    pub cost: String,
    pub description: String,
}

/// Everything an agent is told at the start of its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPrompt {
    pub agent_name: String,
    pub round: u32,
    pub room_name: String,
    pub room_description: String,
    pub exits: Vec<String>,
    pub items_here: Vec<String>,
    pub others_here: Vec<String>,
    pub inventory: Vec<String>,
    pub capacity_used: u32,
    pub capacity_available: u32,
    pub action_points: u32,
    pub actions: Vec<ActionLine>,
    /// Messages of the events drained for this turn, oldest first.
    pub events: Vec<String>,
    pub status: Option<String>,
    pub command_marker: String,
}

impl TurnPrompt {
    /// Assemble the prompt for `agent`. `events` are the ones just drained
    /// from its queue. Returns `None` if the agent is unknown.
    pub fn build(
        world: &World,
        catalog: &Catalog,
        tracker: &MotiveTracker<'_>,
        agent: EntityId,
        events: &[Event],
        round: u32,
        command_marker: &str,
    ) -> Option<Self> {
        let me = world.agent(agent)?;
        let room = world.room(&me.location)?;

        Some(Self {
            agent_name: me.name.clone(),
            round,
            room_name: room.name.clone(),
            room_description: room.description.clone(),
            exits: room.visible_exits().map(|e| e.direction.clone()).collect(),
            items_here: world.items_in_room(&me.location).iter().map(|i| i.name.clone()).collect(),
            others_here: world
                .agents_in_room(&me.location)
                .into_iter()
                .filter(|a| a.id != agent)
                .map(|a| a.name.clone())
                .collect(),
            inventory: world.inventory_of(agent).iter().map(|i| i.name.clone()).collect(),
            capacity_used: capacity_used(world, agent),
            capacity_available: capacity_available(world, me),
            action_points: me.action_points,
            actions: catalog.actions().map(|a| action_line(a, command_marker)).collect(),
            events: events.iter().map(|e| e.message.clone()).collect(),
            status: tracker.status_prompt(me, world),
            command_marker: command_marker.to_string(),
        })
    }

    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("## Round {}: {}\n", self.round, self.agent_name));
        prompt.push_str(&format!("You are in {}.\n", self.room_name));
        if !self.room_description.is_empty() {
            prompt.push_str(&self.room_description);
            prompt.push('\n');
        }
        prompt.push_str(&format!("Exits: {}\n", list_or_none(&self.exits)));
        prompt.push_str(&format!("Items here: {}\n", list_or_none(&self.items_here)));
        prompt.push_str(&format!("Others here: {}\n", list_or_none(&self.others_here)));
        prompt.push('\n');

        if !self.events.is_empty() {
            prompt.push_str("## Since Your Last Turn\n");
            for message in &self.events {
                prompt.push_str(&format!("- {}\n", message));
            }
            prompt.push('\n');
        }

        prompt.push_str("## You\n");
        prompt.push_str(&format!("Action points: {}\n", self.action_points));
        prompt.push_str(&format!(
            "Inventory: {} (capacity used {}, available {})\n",
            list_or_none(&self.inventory),
            self.capacity_used,
            self.capacity_available
        ));
        prompt.push('\n');

        if let Some(status) = &self.status {
            prompt.push_str("## Your Goal\n");
            prompt.push_str(status);
            prompt.push_str("\n\n");
        }

        prompt.push_str("## Actions\n");
        for action in &self.actions {
            prompt.push_str(&format!("- {} ({})", action.usage, action.cost));
            if !action.description.is_empty() {
                prompt.push_str(&format!(": {}", action.description));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "\nWrite one command per line, each starting with `{}`.\n",
            self.command_marker
        ));

        prompt
    }
}

fn action_line(action: &ActionDefinition, marker: &str) -> ActionLine {
    let usage = if action.category == ActionCategory::AddressedSpeech && action.parameters.len() == 2 {
        format!(
            "{} {} <{}> \"<{}>\"",
            marker, action.name, action.parameters[0].name, action.parameters[1].name
        )
    } else {
        action
            .parameter_names()
            .fold(format!("{} {}", marker, action.name), |usage, p| format!("{} <{}>", usage, p))
    };
    let cost = match &action.cost {
        ApCost::Fixed(n) => format!("{} AP", n),
        ApCost::Dynamic(_) => "varies".to_string(),
    };
    ActionLine {
        usage,
        cost,
        description: action.description.clone(),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
