//! The turn loop.
//!
//! A round resets every agent's action points, then gives each agent one
//! turn in fixed order: build its prompt, hand it to the driver, parse the
//! reply and resolve the commands in written order. Events are flushed after
//! every command so later agents see the world as it is now.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use game_rules::effects::{self, EffectContext, EffectOutcome};
use game_rules::inventory::{capacity_available, capacity_used};
use game_rules::requirements::{evaluate_with, object_parameter, Outcome};
use game_rules::{
    Agent, ApCost, Catalog, EntityId, Event, FunctionRegistry, RoomId, Scope, World,
};

use crate::config::EngineConfig;
use crate::distributor::EventDistributor;
use crate::error::EngineError;
use crate::motive::{FinalStatus, MotiveSnapshot, MotiveTracker};
use crate::parser::{ActionCall, Command, CommandParser};
use crate::prompt::TurnPrompt;

/// The party that plays an agent. Called once per turn, one agent at a time.
pub trait AgentDriver {
    /// Answer a turn prompt with free text containing command lines.
    fn submit(&mut self, agent: EntityId, prompt: &str) -> String;
}

/// What happened to one command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Applied { action: String, cost: u32 },
    Rejected { line: String, reason: String },
    /// Not attempted because the agent ran out of action points.
    Skipped { line: String },
    EndTurn,
}

/// End-of-game state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReport {
    pub id: EntityId,
    pub name: String,
    pub location: RoomId,
    pub action_points: u32,
    pub inventory: Vec<String>,
    pub capacity_used: u32,
    pub capacity_available: u32,
    /// Number of `evidence:*` tags held.
    pub evidence: usize,
    pub motive: Option<MotiveSnapshot>,
    /// Events delivered to the agent that it never got to read.
    pub undelivered: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameReport {
    pub rounds_played: u32,
    pub agents: Vec<AgentReport>,
}

impl GameReport {
    pub fn agent(&self, name: &str) -> Option<&AgentReport> {
        self.agents.iter().find(|a| a.name == name)
    }
}

pub struct Game {
    catalog: Catalog,
    world: World,
    config: EngineConfig,
    functions: FunctionRegistry,
    distributor: EventDistributor,
    parser: CommandParser,
    round: u32,
    last_status: BTreeMap<EntityId, FinalStatus>,
}

impl Game {
    pub fn new(catalog: Catalog, mut world: World, config: EngineConfig) -> Self {
        world.inventory_rules = config.inventory;
        let parser = CommandParser::new(config.command_marker.clone(), config.pass_commands.clone());
        Self {
            catalog,
            world,
            config,
            functions: FunctionRegistry::with_builtins(),
            distributor: EventDistributor::new(),
            parser,
            round: 0,
            last_status: BTreeMap::new(),
        }
    }

    /// Build the world from the catalog's rooms.
    pub fn from_catalog(catalog: Catalog, config: EngineConfig) -> Result<Self, EngineError> {
        let world = catalog.build_world()?;
        Ok(Self::new(catalog, world, config))
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn distributor(&self) -> &EventDistributor {
        &self.distributor
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Add an agent at the end of the turn order.
    pub fn add_agent(&mut self, agent: Agent) -> Result<EntityId, EngineError> {
        Ok(self.world.add_agent(agent)?)
    }

    /// Create an agent from a catalog character type and add it.
    pub fn spawn_character(
        &mut self,
        character_type: &str,
        name: &str,
        room: Option<RoomId>,
    ) -> Result<EntityId, EngineError> {
        let agent = self.catalog.create_agent(character_type, name, room)?;
        self.add_agent(agent)
    }

    /// Bind a catalog motive to an agent. Each agent is bound at most once.
    pub fn bind_motive(&mut self, agent: EntityId, motive_id: &str) -> Result<(), EngineError> {
        self.catalog.motive(motive_id)?;
        self.world
            .agent_mut(agent)
            .ok_or(EngineError::UnknownAgent(agent))?
            .bind_motive(motive_id)?;
        Ok(())
    }

    pub fn snapshot(&self, agent: EntityId) -> Option<MotiveSnapshot> {
        let tracker = MotiveTracker::new(&self.catalog, &self.functions);
        tracker.snapshot(self.world.agent(agent)?, &self.world)
    }

    /// Build `agent`'s turn prompt, draining its event queue.
    pub fn prompt_for(&mut self, agent: EntityId) -> Result<String, EngineError> {
        let events = self.distributor.drain(agent);
        let tracker = MotiveTracker::new(&self.catalog, &self.functions);
        let prompt = TurnPrompt::build(
            &self.world,
            &self.catalog,
            &tracker,
            agent,
            &events,
            self.round,
            &self.config.command_marker,
        )
        .ok_or(EngineError::UnknownAgent(agent))?;
        Ok(prompt.to_prompt_string())
    }

    /// Parse `text` and resolve its commands in written order.
    pub fn submit_text(&mut self, agent: EntityId, text: &str) -> Result<Vec<Resolution>, EngineError> {
        let parsed = {
            let me = self.world.agent(agent).ok_or(EngineError::UnknownAgent(agent))?;
            let aliases = visible_aliases(&self.world, me);
            let actions: Vec<_> = self.catalog.actions().collect();
            self.parser.parse(text, &actions, &aliases)
        };

        let mut resolutions = Vec::with_capacity(parsed.len());
        let mut exhausted = false;
        for line in parsed {
            let resolution = match line {
                Ok(Command::EndTurn) => {
                    resolutions.push(Resolution::EndTurn);
                    break;
                }
                Ok(Command::Action(call)) if exhausted => {
                    self.feedback(agent, format!("Not enough action points for `{}`.", call.line));
                    Resolution::Skipped { line: call.line }
                }
                Ok(Command::Action(call)) => {
                    let resolution = self.resolve(agent, &call)?;
                    exhausted = matches!(resolution, Resolution::Skipped { .. });
                    resolution
                }
                Err(err) => {
                    self.feedback(agent, format!("Invalid action: {}", err));
                    Resolution::Rejected {
                        line: err.line().to_string(),
                        reason: err.to_string(),
                    }
                }
            };
            debug!(agent = %agent, resolution = ?resolution, "command resolved");
            resolutions.push(resolution);
            self.distributor.flush(&self.world);
        }
        self.distributor.flush(&self.world);
        Ok(resolutions)
    }

    fn resolve(&mut self, agent: EntityId, call: &ActionCall) -> Result<Resolution, EngineError> {
        let rejected = |reason: String| Resolution::Rejected {
            line: call.line.clone(),
            reason,
        };
        let Some(action) = self.catalog.action(&call.action_id) else {
            let reason = format!("Unknown action `{}`.", call.action_id);
            notify(&mut self.world, &mut self.distributor, agent, reason.clone());
            return Ok(rejected(reason));
        };
        let me = self.world.agent(agent).ok_or(EngineError::UnknownAgent(agent))?;

        let cost = match &action.cost {
            ApCost::Fixed(n) => *n,
            ApCost::Dynamic(name) => match self.functions.cost(name, &self.world, me, &call.params) {
                Ok(n) => n,
                Err(err) => {
                    warn!(action = %action.id, error = %err, "cost function failed");
                    let reason = format!("You can't {} right now.", action.name);
                    notify(&mut self.world, &mut self.distributor, agent, reason.clone());
                    return Ok(rejected(reason));
                }
            },
        };
        if me.action_points < cost {
            let reason = format!(
                "Not enough action points for `{}` (needs {}, you have {}).",
                call.line, cost, me.action_points
            );
            notify(&mut self.world, &mut self.distributor, agent, reason);
            return Ok(Resolution::Skipped {
                line: call.line.clone(),
            });
        }

        if let Some(requirements) = &action.requirements {
            let gate = evaluate_with(me, &self.world, requirements, &call.params, self.functions.fallback());
            let failure = match gate {
                Outcome::Pass => None,
                Outcome::Fail(message) => Some(message),
                Outcome::Unhandled(kind) => {
                    warn!(action = %action.id, kind = %kind, "action gated by an unhandled requirement kind");
                    Some(format!("You can't {} right now.", action.name))
                }
            };
            if let Some(reason) = failure {
                notify(&mut self.world, &mut self.distributor, agent, reason.clone());
                return Ok(rejected(reason));
            }
        }

        let mut effect_list = action.effects.clone();
        if let Some(item) = object_parameter(&call.params).and_then(|name| self.world.find_visible_item(me, name)) {
            if let Some(extra) = item.interaction(&call.verb).or_else(|| item.interaction(&action.name)) {
                effect_list.extend_from_slice(extra);
            }
        }

        let ctx = EffectContext {
            catalog: &self.catalog,
            functions: &self.functions,
        };
        match effects::apply(&mut self.world, &ctx, agent, &effect_list, &call.params) {
            Ok(EffectOutcome::Applied { events, feedback }) => {
                if let Some(me) = self.world.agent_mut(agent) {
                    me.spend_action_points(cost);
                }
                self.distributor.publish_all(events);
                for message in feedback {
                    notify(&mut self.world, &mut self.distributor, agent, message);
                }
                Ok(Resolution::Applied {
                    action: action.id.clone(),
                    cost,
                })
            }
            Ok(EffectOutcome::Refused { feedback, event }) => {
                self.distributor.publish_all(event);
                notify(&mut self.world, &mut self.distributor, agent, feedback.clone());
                Ok(rejected(feedback))
            }
            Err(err) => {
                warn!(action = %action.id, error = %err, "effects failed and were rolled back");
                let reason = format!("You can't {} right now.", action.name);
                notify(&mut self.world, &mut self.distributor, agent, reason.clone());
                Ok(rejected(reason))
            }
        }
    }

    /// Play one round with every agent in turn order.
    pub fn run_round(&mut self, driver: &mut dyn AgentDriver) -> Result<(), EngineError> {
        self.round += 1;
        self.world.begin_round(self.round);
        info!(round = self.round, "round started");

        let order = self.world.turn_order.clone();
        for id in &order {
            if let Some(agent) = self.world.agent_mut(*id) {
                agent.reset_action_points(self.config.ap_per_round);
            }
        }

        for id in order {
            let prompt = self.prompt_for(id)?;
            let reply = driver.submit(id, &prompt);
            self.submit_text(id, &reply)?;
            self.world.advance_turn();
        }

        self.end_round();
        Ok(())
    }

    /// Play `config.max_rounds` rounds and report.
    pub fn run(&mut self, driver: &mut dyn AgentDriver) -> Result<GameReport, EngineError> {
        self.run_rounds(driver, self.config.max_rounds)
    }

    pub fn run_rounds(&mut self, driver: &mut dyn AgentDriver, rounds: u32) -> Result<GameReport, EngineError> {
        for _ in 0..rounds {
            self.run_round(driver)?;
        }
        Ok(self.report())
    }

    /// Round boundary: expire status effects, then narrate motive progress.
    fn end_round(&mut self) {
        for (entity, expired) in self.world.statuses.advance_all() {
            let Some(room) = self.location_of(entity) else {
                continue;
            };
            for name in expired {
                let event = self
                    .world
                    .event(format!("{} wears off.", name), "status", room.clone(), Scope::SelfOnly)
                    .with_actor(entity);
                self.distributor.publish(event);
            }
        }

        let tracker = MotiveTracker::new(&self.catalog, &self.functions);
        for id in self.world.turn_order.clone() {
            let narration = tracker.progress(&mut self.world, id);
            let Some(room) = self.location_of(id) else { continue };
            for narrative in narration {
                let event = self
                    .world
                    .event(narrative, "progress", room.clone(), Scope::SelfOnly)
                    .with_actor(id);
                self.distributor.publish(event);
            }

            let Some(agent) = self.world.agent(id) else { continue };
            let Some(snapshot) = tracker.snapshot(agent, &self.world) else { continue };
            let previous = self.last_status.insert(id, snapshot.final_status);
            if previous != Some(snapshot.final_status) {
                info!(
                    agent = %agent.name,
                    motive = %snapshot.motive_id,
                    status = ?snapshot.final_status,
                    "motive status changed"
                );
            }
        }

        self.distributor.flush(&self.world);
    }

    pub fn report(&self) -> GameReport {
        let tracker = MotiveTracker::new(&self.catalog, &self.functions);
        let mut undelivered = self.distributor.undelivered();
        let agents = self
            .world
            .turn_order
            .iter()
            .filter_map(|id| self.world.agent(*id))
            .map(|agent| AgentReport {
                id: agent.id,
                name: agent.name.clone(),
                location: agent.location.clone(),
                action_points: agent.action_points,
                inventory: self.world.inventory_of(agent.id).iter().map(|i| i.name.clone()).collect(),
                capacity_used: capacity_used(&self.world, agent.id),
                capacity_available: capacity_available(&self.world, agent),
                evidence: agent.evidence_count(),
                motive: tracker.snapshot(agent, &self.world),
                undelivered: undelivered.remove(&agent.id).unwrap_or_default(),
            })
            .collect();
        GameReport {
            rounds_played: self.round,
            agents,
        }
    }

    fn feedback(&mut self, agent: EntityId, message: String) {
        notify(&mut self.world, &mut self.distributor, agent, message);
    }

    fn location_of(&self, agent: EntityId) -> Option<RoomId> {
        self.world.agent(agent).map(|a| a.location.clone())
    }
}

/// Queue a private message for `agent`.
fn notify(world: &mut World, distributor: &mut EventDistributor, agent: EntityId, message: String) {
    let Some(room) = world.agent(agent).map(|a| a.location.clone()) else {
        return;
    };
    let event = world
        .event(message, "feedback", room, Scope::SelfOnly)
        .with_actor(agent);
    distributor.publish(event);
}

/// Verb aliases offered by the items an agent can see.
fn visible_aliases(world: &World, agent: &Agent) -> BTreeMap<String, String> {
    world
        .items_in_room(&agent.location)
        .into_iter()
        .chain(world.inventory_of(agent.id))
        .flat_map(|item| item.verb_aliases.clone())
        .collect()
}
