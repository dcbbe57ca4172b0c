//! Motive evaluation: win/lose status, progress narration, status prompts.
//!
//! Status is recomputed from the world every time it is asked for, so an
//! agent whose failure condition stops holding can recover. Progress
//! narration is the one stateful part: it fires on a leaf's false-to-true
//! edge and is latched in the agent's progress memo.

use serde::{Deserialize, Serialize};
use tracing::warn;

use game_rules::requirements::{evaluate_with, Outcome};
use game_rules::{Agent, Catalog, EntityId, FunctionRegistry, Motive, Params, RequirementNode, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    Win,
    Fail,
    NotAchieved,
}

impl FinalStatus {
    /// Failure takes precedence over success.
    pub fn from_flags(success: bool, failure: bool) -> Self {
        if failure {
            FinalStatus::Fail
        } else if success {
            FinalStatus::Win
        } else {
            FinalStatus::NotAchieved
        }
    }
}

/// Debug view of an agent's motive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotiveSnapshot {
    pub motive_id: String,
    pub success: bool,
    pub failure: bool,
    pub final_status: FinalStatus,
}

/// Evaluates motives against the live world.
#[derive(Debug, Clone, Copy)]
pub struct MotiveTracker<'a> {
    catalog: &'a Catalog,
    functions: &'a FunctionRegistry,
}

impl<'a> MotiveTracker<'a> {
    pub fn new(catalog: &'a Catalog, functions: &'a FunctionRegistry) -> Self {
        Self { catalog, functions }
    }

    /// The motive bound to `agent`, if it exists in the catalog.
    pub fn motive_of(&self, agent: &Agent) -> Option<&'a Motive> {
        let id = agent.motive_id()?;
        match self.catalog.motive(id) {
            Ok(motive) => Some(motive),
            Err(err) => {
                warn!(agent = %agent.name, error = %err, "bound motive is missing from the catalog");
                None
            }
        }
    }

    pub fn success(&self, agent: &Agent, world: &World) -> bool {
        self.motive_of(agent)
            .is_some_and(|m| self.holds(agent, world, m.success.as_ref()))
    }

    pub fn failure(&self, agent: &Agent, world: &World) -> bool {
        self.motive_of(agent)
            .is_some_and(|m| self.holds(agent, world, m.failure.as_ref()))
    }

    pub fn final_status(&self, agent: &Agent, world: &World) -> FinalStatus {
        FinalStatus::from_flags(self.success(agent, world), self.failure(agent, world))
    }

    pub fn snapshot(&self, agent: &Agent, world: &World) -> Option<MotiveSnapshot> {
        let motive = self.motive_of(agent)?;
        let success = self.holds(agent, world, motive.success.as_ref());
        let failure = self.holds(agent, world, motive.failure.as_ref());
        Some(MotiveSnapshot {
            motive_id: motive.id.clone(),
            success,
            failure,
            final_status: FinalStatus::from_flags(success, failure),
        })
    }

    /// The first status prompt whose gate passes, else the default for the
    /// current branch.
    pub fn status_prompt(&self, agent: &Agent, world: &World) -> Option<String> {
        let motive = self.motive_of(agent)?;
        let gated = motive
            .status_prompts
            .iter()
            .find(|prompt| prompt.when.is_none() || self.holds(agent, world, prompt.when.as_ref()));
        if let Some(prompt) = gated {
            return Some(prompt.text.clone());
        }

        if self.holds(agent, world, motive.failure.as_ref()) {
            motive.failing_prompt.clone()
        } else if self.holds(agent, world, motive.success.as_ref()) {
            motive.succeeding_prompt.clone()
        } else {
            None
        }
    }

    /// Re-check every success leaf of `agent`'s motive, record what was seen
    /// and return the narratives of leaves that just turned true.
    pub fn progress(&self, world: &mut World, agent: EntityId) -> Vec<String> {
        let Some(observed) = self.observe_leaves(world, agent) else {
            return Vec::new();
        };
        let Some(binding) = world.agent_mut(agent).and_then(|a| a.motive.as_mut()) else {
            return Vec::new();
        };

        let mut narration = Vec::new();
        for (key, now, narrative) in observed {
            let before = binding.progress_memo.insert(key, now).unwrap_or(false);
            if now && !before {
                narration.extend(narrative);
            }
        }
        narration
    }

    fn observe_leaves(&self, world: &World, agent: EntityId) -> Option<Vec<(String, bool, Option<String>)>> {
        let agent = world.agent(agent)?;
        let motive = self.motive_of(agent)?;
        let success = motive.success.as_ref()?;

        let observed = success
            .leaves()
            .into_iter()
            .map(|(path, leaf)| {
                let key = format!("{}/{}", motive.id, leaf.stable_key(&path));
                let node = RequirementNode::Leaf(leaf.clone());
                (key, self.holds(agent, world, Some(&node)), leaf.narrative.clone())
            })
            .collect();
        Some(observed)
    }

    /// Evaluate a motive tree. Missing trees and unhandled kinds are false.
    fn holds(&self, agent: &Agent, world: &World, node: Option<&RequirementNode>) -> bool {
        let Some(node) = node else {
            return false;
        };
        match evaluate_with(agent, world, node, &Params::new(), self.functions.fallback()) {
            Outcome::Pass => true,
            Outcome::Fail(_) => false,
            Outcome::Unhandled(kind) => {
                warn!(agent = %agent.name, kind = %kind, "motive uses an unhandled requirement kind");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_rules::{Room, RoomId};

    const MOTIVES: &str = r#"
        [[motives]]
        id = "find_mayor"
        success = { kind = "and", children = [
            { kind = "has_tag", tag = "found_mayor", narrative = "You have found the mayor." },
            { kind = "has_tag", tag = "cult_exposed", narrative = "The cult is exposed." },
        ] }
        failure = { kind = "or", children = [
            { kind = "has_tag", tag = "mayor_dead" },
            { kind = "has_tag", tag = "cult_succeeded" },
        ] }
        failing_prompt = "The town is lost."
        succeeding_prompt = "Justice is done."

        [[motives.status_prompts]]
        text = "Someone in town knows where the mayor is."
        when = { kind = "lacks_tag", tag = "found_mayor" }

        [[motives]]
        id = "unknowable"
        success = { kind = "star_alignment", stars = 7 }
    "#;

    fn setup(motive: &str) -> (Catalog, FunctionRegistry, World, EntityId) {
        let catalog = Catalog::from_toml_str(MOTIVES).unwrap();
        let mut world = World::new();
        world.add_room(Room::new("town", "Town"));
        let mut agent = Agent::new("Ines", RoomId::new("town"));
        agent.bind_motive(motive).unwrap();
        let id = world.add_agent(agent).unwrap();
        (catalog, FunctionRegistry::with_builtins(), world, id)
    }

    fn tag(world: &mut World, agent: EntityId, name: &str) {
        world.agent_mut(agent).unwrap().attributes.add_tag(name);
    }

    fn untag(world: &mut World, agent: EntityId, name: &str) {
        world.agent_mut(agent).unwrap().attributes.remove_tag(name);
    }

    #[test]
    fn test_mayor_and_cult_scenario() {
        let (catalog, functions, mut world, id) = setup("find_mayor");
        let tracker = MotiveTracker::new(&catalog, &functions);
        let status = |world: &World| tracker.final_status(world.agent(id).unwrap(), world);

        tag(&mut world, id, "found_mayor");
        assert_eq!(status(&world), FinalStatus::NotAchieved);

        tag(&mut world, id, "cult_exposed");
        assert_eq!(status(&world), FinalStatus::Win);

        tag(&mut world, id, "mayor_dead");
        assert_eq!(status(&world), FinalStatus::Fail);
    }

    #[test]
    fn test_failure_precedence_and_redemption() {
        let (catalog, functions, mut world, id) = setup("find_mayor");
        let tracker = MotiveTracker::new(&catalog, &functions);
        for t in ["found_mayor", "cult_exposed", "cult_succeeded"] {
            tag(&mut world, id, t);
        }

        let snapshot = tracker.snapshot(world.agent(id).unwrap(), &world).unwrap();
        assert!(snapshot.success && snapshot.failure);
        assert_eq!(snapshot.final_status, FinalStatus::Fail);

        untag(&mut world, id, "cult_succeeded");
        assert_eq!(tracker.final_status(world.agent(id).unwrap(), &world), FinalStatus::Win);
    }

    #[test]
    fn test_progress_narration_is_latched() {
        let (catalog, functions, mut world, id) = setup("find_mayor");
        let tracker = MotiveTracker::new(&catalog, &functions);

        assert!(tracker.progress(&mut world, id).is_empty());

        tag(&mut world, id, "found_mayor");
        assert_eq!(tracker.progress(&mut world, id), vec!["You have found the mayor."]);
        assert!(tracker.progress(&mut world, id).is_empty());
        assert!(tracker.progress(&mut world, id).is_empty());

        // A genuine false-to-true edge fires again.
        untag(&mut world, id, "found_mayor");
        assert!(tracker.progress(&mut world, id).is_empty());
        tag(&mut world, id, "found_mayor");
        assert_eq!(tracker.progress(&mut world, id).len(), 1);
    }

    #[test]
    fn test_status_prompt_selection() {
        let (catalog, functions, mut world, id) = setup("find_mayor");
        let tracker = MotiveTracker::new(&catalog, &functions);
        let prompt = |world: &World| tracker.status_prompt(world.agent(id).unwrap(), world);

        assert_eq!(
            prompt(&world).as_deref(),
            Some("Someone in town knows where the mayor is.")
        );

        tag(&mut world, id, "found_mayor");
        assert_eq!(prompt(&world), None);

        tag(&mut world, id, "cult_exposed");
        assert_eq!(prompt(&world).as_deref(), Some("Justice is done."));

        tag(&mut world, id, "mayor_dead");
        assert_eq!(prompt(&world).as_deref(), Some("The town is lost."));
    }

    #[test]
    fn test_unhandled_kind_is_false_unless_fallback_decides() {
        let (catalog, mut functions, world, id) = setup("unknowable");
        {
            let tracker = MotiveTracker::new(&catalog, &functions);
            assert!(!tracker.success(world.agent(id).unwrap(), &world));
        }

        functions.register_requirement_fallback(|kind, payload, _agent, _world, _params| {
            (kind == "star_alignment").then(|| payload["stars"] == 7)
        });
        let tracker = MotiveTracker::new(&catalog, &functions);
        assert!(tracker.success(world.agent(id).unwrap(), &world));
    }

    #[test]
    fn test_snapshot_serializes_status_names() {
        let (catalog, functions, world, id) = setup("find_mayor");
        let tracker = MotiveTracker::new(&catalog, &functions);
        let snapshot = tracker.snapshot(world.agent(id).unwrap(), &world).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["final_status"], "NOT_ACHIEVED");
        assert_eq!(value["motive_id"], "find_mayor");
    }
}
