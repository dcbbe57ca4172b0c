//! Declarative effects and their all-or-nothing application.
//!
//! An action's effect list is applied to a staged copy of the world. The
//! copy replaces the live world only when every effect succeeded; a refusal
//! or an error leaves the live world exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::entities::{Agent, Attributes, EntityId, Placement, RoomId};
use crate::error::RulesError;
use crate::events::{Event, Scope};
use crate::functions::{Args, FunctionRegistry};
use crate::inventory;
use crate::requirements::{
    agent_property, evaluate_with, object_parameter, resolve_named, resolve_target, resolve_text, EntityRef,
    Outcome, Params, RequirementNode, TargetRef,
};
use crate::status::StatusEffect;
use crate::value::PropertyValue;
use crate::world_state::World;

fn unit_amount() -> PropertyValue {
    PropertyValue::Int(1)
}

fn default_category() -> String {
    "action".to_string()
}

/// A single world mutation.
///
/// `target: None` means the acting agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    AddTag {
        #[serde(default)]
        target: Option<TargetRef>,
        tag: String,
    },
    RemoveTag {
        #[serde(default)]
        target: Option<TargetRef>,
        tag: String,
    },
    SetProperty {
        #[serde(default)]
        target: Option<TargetRef>,
        property: String,
        value: PropertyValue,
    },
    IncrementProperty {
        #[serde(default)]
        target: Option<TargetRef>,
        property: String,
        #[serde(default = "unit_amount")]
        amount: PropertyValue,
    },
    /// Run `then` or `otherwise` depending on a requirement.
    Conditional {
        requirement: RequirementNode,
        #[serde(default)]
        then: Vec<Effect>,
        #[serde(default)]
        otherwise: Vec<Effect>,
    },
    EmitEvent {
        message: String,
        #[serde(default = "default_category")]
        category: String,
        #[serde(default)]
        scope: Scope,
    },
    /// Text for the acting agent only.
    Feedback { message: String },
    TakeItem { object: TargetRef },
    DropItem { object: TargetRef },
    GiveItem { object: TargetRef, recipient: TargetRef },
    Move {
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        parameter: Option<String>,
    },
    /// Call a registered effect function.
    Invoke {
        function: String,
        #[serde(default)]
        args: Args,
    },
    Spawn {
        object_type: String,
        #[serde(default)]
        into_inventory: bool,
        #[serde(default)]
        properties: BTreeMap<String, PropertyValue>,
    },
    Destroy {
        object: TargetRef,
        #[serde(default)]
        reason: Option<String>,
    },
    ApplyStatus {
        #[serde(default)]
        target: Option<TargetRef>,
        status: StatusEffect,
    },
    RemoveStatus {
        #[serde(default)]
        target: Option<TargetRef>,
        name: String,
    },
}

impl Effect {
    /// Action parameters this effect (and any nested effect) reads.
    pub fn referenced_parameters(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        match self {
            Effect::AddTag { target, .. }
            | Effect::RemoveTag { target, .. }
            | Effect::SetProperty { target, .. }
            | Effect::IncrementProperty { target, .. }
            | Effect::ApplyStatus { target, .. }
            | Effect::RemoveStatus { target, .. } => add_parameter(out, target.as_ref()),
            Effect::TakeItem { object } | Effect::DropItem { object } | Effect::Destroy { object, .. } => {
                add_parameter(out, Some(object))
            }
            Effect::GiveItem { object, recipient } => {
                add_parameter(out, Some(object));
                add_parameter(out, Some(recipient));
            }
            Effect::Move {
                parameter: Some(p), ..
            } => {
                out.insert(p.clone());
            }
            Effect::Conditional {
                requirement,
                then,
                otherwise,
            } => {
                out.extend(requirement.referenced_parameters());
                for effect in then.iter().chain(otherwise) {
                    effect.collect_parameters(out);
                }
            }
            _ => {}
        }
    }
}

fn add_parameter(out: &mut BTreeSet<String>, target: Option<&TargetRef>) {
    if let Some(TargetRef::Parameter(p)) = target {
        out.insert(p.clone());
    }
}

/// Shared, read-only inputs of effect application.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    pub catalog: &'a Catalog,
    pub functions: &'a FunctionRegistry,
}

/// Result of applying an effect list.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutcome {
    /// Every effect ran and the world was updated.
    Applied { events: Vec<Event>, feedback: Vec<String> },
    /// An effect declined to run; the world is unchanged.
    Refused { feedback: String, event: Option<Event> },
}

enum Flow {
    Continue,
    Refused { feedback: String, event: Option<Event> },
}

impl Flow {
    fn refuse(feedback: impl Into<String>) -> Self {
        Flow::Refused {
            feedback: feedback.into(),
            event: None,
        }
    }
}

/// What an effect target resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Handle {
    Agent(EntityId),
    Item(EntityId),
    Room(RoomId),
}

impl From<EntityRef<'_>> for Handle {
    fn from(entity: EntityRef<'_>) -> Self {
        match entity {
            EntityRef::Agent(a) => Handle::Agent(a.id),
            EntityRef::Item(i) => Handle::Item(i.id),
            EntityRef::Room(r) => Handle::Room(r.id.clone()),
        }
    }
}

/// Apply `effects` for `actor` as one atomic unit.
pub fn apply(
    world: &mut World,
    ctx: &EffectContext<'_>,
    actor: EntityId,
    effects: &[Effect],
    params: &Params,
) -> Result<EffectOutcome, RulesError> {
    let mut staged = world.clone();
    let mut applier = Applier {
        actor,
        params,
        ctx,
        events: Vec::new(),
        feedback: Vec::new(),
        doomed: Vec::new(),
    };

    match applier.run(&mut staged, effects)? {
        Flow::Continue => {
            // Tombstones land only once the whole list has gone through.
            for (item, reason) in &applier.doomed {
                staged.destroy(*item, reason);
            }
            *world = staged;
            Ok(EffectOutcome::Applied {
                events: applier.events,
                feedback: applier.feedback,
            })
        }
        Flow::Refused { feedback, event } => {
            debug!(agent = %actor, feedback = %feedback, "effects refused, world unchanged");
            world.adopt_sequence(&staged);
            Ok(EffectOutcome::Refused { feedback, event })
        }
    }
}

struct Applier<'a> {
    actor: EntityId,
    params: &'a Params,
    ctx: &'a EffectContext<'a>,
    events: Vec<Event>,
    feedback: Vec<String>,
    doomed: Vec<(EntityId, String)>,
}

impl Applier<'_> {
    fn run(&mut self, world: &mut World, effects: &[Effect]) -> Result<Flow, RulesError> {
        for effect in effects {
            if let Flow::Refused { feedback, event } = self.step(world, effect)? {
                return Ok(Flow::Refused { feedback, event });
            }
        }
        Ok(Flow::Continue)
    }

    fn actor<'w>(&self, world: &'w World) -> Result<&'w Agent, RulesError> {
        world.agent(self.actor).ok_or(RulesError::UnknownEntity(self.actor))
    }

    fn location(&self, world: &World) -> Result<RoomId, RulesError> {
        Ok(self.actor(world)?.location.clone())
    }

    fn resolve(&self, world: &World, target: Option<&TargetRef>) -> Result<Handle, RulesError> {
        match target {
            None | Some(TargetRef::Agent) => Ok(Handle::Agent(self.actor)),
            Some(target) => resolve_target(self.actor(world)?, world, Some(target), self.params)
                .map(Handle::from)
                .ok_or_else(|| RulesError::UnresolvedTarget(describe(target, self.params))),
        }
    }

    fn resolve_item(&self, world: &World, target: &TargetRef) -> Result<EntityId, RulesError> {
        match self.resolve(world, Some(target))? {
            Handle::Item(id) => Ok(id),
            _ => Err(RulesError::Effect(format!(
                "`{}` is not an item",
                describe(target, self.params)
            ))),
        }
    }

    fn render(&self, world: &World, template: &str) -> Result<String, RulesError> {
        Ok(render_template(template, self.actor(world)?, world, self.params))
    }

    fn step(&mut self, world: &mut World, effect: &Effect) -> Result<Flow, RulesError> {
        match effect {
            Effect::AddTag { target, tag } => {
                let handle = self.resolve(world, target.as_ref())?;
                attributes_mut(world, &handle)?.add_tag(tag.clone());
            }
            Effect::RemoveTag { target, tag } => {
                let handle = self.resolve(world, target.as_ref())?;
                attributes_mut(world, &handle)?.remove_tag(tag);
            }
            Effect::SetProperty {
                target,
                property,
                value,
            } => {
                let handle = self.resolve(world, target.as_ref())?;
                let value = match value {
                    PropertyValue::Text(text) => PropertyValue::Text(self.render(world, text)?),
                    other => other.clone(),
                };
                attributes_mut(world, &handle)?.set_property(property.clone(), value);
            }
            Effect::IncrementProperty {
                target,
                property,
                amount,
            } => {
                let handle = self.resolve(world, target.as_ref())?;
                attributes_mut(world, &handle)?
                    .increment_property(property, amount)
                    .ok_or_else(|| RulesError::Effect(format!("cannot increment non-numeric `{}`", property)))?;
            }
            Effect::Conditional {
                requirement,
                then,
                otherwise,
            } => {
                let outcome = evaluate_with(
                    self.actor(world)?,
                    world,
                    requirement,
                    self.params,
                    self.ctx.functions.fallback(),
                );
                let branch = match outcome {
                    Outcome::Pass => then,
                    Outcome::Fail(_) => otherwise,
                    Outcome::Unhandled(kind) => {
                        warn!(kind = %kind, "conditional effect uses an unhandled requirement kind");
                        otherwise
                    }
                };
                return self.run(world, branch);
            }
            Effect::EmitEvent {
                message,
                category,
                scope,
            } => {
                let message = self.render(world, message)?;
                let origin = self.location(world)?;
                let related = object_parameter(self.params).and_then(|name| {
                    match resolve_named(self.actor(world).ok()?, world, name)? {
                        EntityRef::Item(item) => Some(Handle::Item(item.id)),
                        EntityRef::Agent(agent) => Some(Handle::Agent(agent.id)),
                        EntityRef::Room(_) => None,
                    }
                });
                let mut event = world
                    .event(message, category.clone(), origin, *scope)
                    .with_actor(self.actor);
                match related {
                    Some(Handle::Item(id)) => event = event.with_related_item(id),
                    Some(Handle::Agent(id)) => event = event.with_related_agent(id),
                    _ => {}
                }
                self.events.push(event);
            }
            Effect::Feedback { message } => {
                let message = self.render(world, message)?;
                self.feedback.push(message);
            }
            Effect::TakeItem { object } => {
                let item = self.resolve_item(world, object)?;
                return self.admit(world, item, self.actor);
            }
            Effect::DropItem { object } => {
                let item = self.resolve_item(world, object)?;
                if !self.carries(world, item) {
                    return Ok(Flow::refuse(format!("You are not carrying the {}.", item_name(world, item))));
                }
                let room = self.location(world)?;
                world.transfer_item(item, Placement::Room(room))?;
            }
            Effect::GiveItem { object, recipient } => {
                let item = self.resolve_item(world, object)?;
                if !self.carries(world, item) {
                    return Ok(Flow::refuse(format!("You are not carrying the {}.", item_name(world, item))));
                }
                let recipient = match self.resolve(world, Some(recipient))? {
                    Handle::Agent(id) if id != self.actor => id,
                    _ => return Ok(Flow::refuse("There is no one here to give that to.")),
                };
                return self.admit(world, item, recipient);
            }
            Effect::Move { direction, parameter } => {
                let direction = resolve_text(direction.as_deref(), parameter.as_deref(), self.params)
                    .ok_or_else(|| RulesError::UnresolvedTarget("direction".to_string()))?;
                let location = self.location(world)?;
                let target = world
                    .room(&location)
                    .and_then(|r| r.find_exit(&direction))
                    .map(|exit| exit.target.clone());
                match target {
                    Some(target) => world.move_agent(self.actor, &target)?,
                    None => return Ok(Flow::refuse(format!("You can't go {} from here.", direction))),
                }
            }
            Effect::Invoke { function, args } => {
                let output = self
                    .ctx
                    .functions
                    .invoke(function, world, self.actor, self.params, args)?;
                self.events.extend(output.events);
                self.feedback.extend(output.feedback);
            }
            Effect::Spawn {
                object_type,
                into_inventory,
                properties,
            } => {
                let room = self.location(world)?;
                let (id, event) = world.spawn(
                    self.ctx.catalog,
                    object_type,
                    Placement::Room(room),
                    properties.clone(),
                )?;
                self.events.push(event);
                if *into_inventory {
                    return self.admit(world, id, self.actor);
                }
            }
            Effect::Destroy { object, reason } => {
                let item = self.resolve_item(world, object)?;
                let reason = reason.as_deref().unwrap_or("destroyed").to_string();
                self.doomed.push((item, reason));
            }
            Effect::ApplyStatus { target, status } => {
                let entity = status_holder(self.resolve(world, target.as_ref())?)?;
                world.statuses.apply(entity, status.clone());
            }
            Effect::RemoveStatus { target, name } => {
                let entity = status_holder(self.resolve(world, target.as_ref())?)?;
                world.statuses.remove(entity, name);
            }
        }
        Ok(Flow::Continue)
    }

    fn carries(&self, world: &World, item: EntityId) -> bool {
        world
            .item(item)
            .is_some_and(|i| i.placement == Placement::Agent(self.actor))
    }

    /// Move an item into `receiver`'s inventory after the inventory checks.
    fn admit(&mut self, world: &mut World, item: EntityId, receiver: EntityId) -> Result<Flow, RulesError> {
        if world
            .item(item)
            .is_some_and(|i| i.placement == Placement::Agent(receiver))
        {
            return Ok(Flow::refuse(format!("The {} is already carried.", item_name(world, item))));
        }
        let admission = inventory::can_add(world, item, receiver)?;
        if !admission.allowed {
            return Ok(Flow::Refused {
                feedback: admission
                    .reason
                    .unwrap_or_else(|| "You cannot carry that.".to_string()),
                event: admission.broadcast,
            });
        }
        world.transfer_item(item, Placement::Agent(receiver))?;
        Ok(Flow::Continue)
    }
}

fn attributes_mut<'w>(world: &'w mut World, handle: &Handle) -> Result<&'w mut Attributes, RulesError> {
    match handle {
        Handle::Agent(id) => world
            .agent_mut(*id)
            .map(|a| &mut a.attributes)
            .ok_or(RulesError::UnknownEntity(*id)),
        Handle::Item(id) => world
            .item_mut(*id)
            .map(|i| &mut i.attributes)
            .ok_or(RulesError::UnknownEntity(*id)),
        Handle::Room(id) => world
            .room_mut(id)
            .map(|r| &mut r.attributes)
            .ok_or_else(|| RulesError::UnknownRoom(id.to_string())),
    }
}

fn status_holder(handle: Handle) -> Result<EntityId, RulesError> {
    match handle {
        Handle::Agent(id) | Handle::Item(id) => Ok(id),
        Handle::Room(room) => Err(RulesError::Effect(format!(
            "room `{}` cannot hold status effects",
            room
        ))),
    }
}

fn item_name(world: &World, item: EntityId) -> String {
    world
        .item(item)
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "item".to_string())
}

fn describe(target: &TargetRef, params: &Params) -> String {
    match target {
        TargetRef::Agent => "self".to_string(),
        TargetRef::Room => "room".to_string(),
        TargetRef::Id(id) => id.clone(),
        TargetRef::Named(name) => name.clone(),
        TargetRef::Parameter(p) => params.get(p).cloned().unwrap_or_else(|| p.clone()),
    }
}

/// Fill `{{...}}` placeholders in an authored text.
///
/// Supported: `player_name`, `room_name`, `target`, `param:<name>` and
/// `player_property:<name>`. Anything unresolvable renders as empty text.
pub fn render_template(template: &str, agent: &Agent, world: &World, params: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match placeholder(key, agent, world, params) {
                    Some(value) => out.push_str(&value),
                    None => warn!(placeholder = key, "unresolved template placeholder"),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(after);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholder(key: &str, agent: &Agent, world: &World, params: &Params) -> Option<String> {
    if let Some(name) = key.strip_prefix("player_property:") {
        return agent_property(agent, world, name.trim()).map(|v| v.to_string());
    }
    if let Some(name) = key.strip_prefix("param:") {
        return params.get(name.trim()).cloned();
    }
    match key {
        "player_name" => Some(agent.name.clone()),
        "room_name" => world.room(&agent.location).map(|r| r.name.clone()),
        "target" => object_parameter(params).map(|name| {
            resolve_named(agent, world, name)
                .map(|entity| entity.name().to_string())
                .unwrap_or_else(|| name.to_string())
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Exit, Item, Room};
    use crate::functions::FunctionOutput;

    const CATALOG: &str = r#"
        [[object_types]]
        id = "coin"
        name = "Gold Coin"
        properties = { size = "tiny" }
    "#;

    struct Fixture {
        world: World,
        catalog: Catalog,
        functions: FunctionRegistry,
        agent: EntityId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut world = World::new();
            world.add_room(Room::new("yard", "Yard").with_exit(Exit::new("east", RoomId::new("barn"))));
            world.add_room(Room::new("barn", "Barn"));
            let agent = world
                .add_agent(
                    Agent::new("Wren", RoomId::new("yard"))
                        .with_attributes(Attributes::new().with_property("size", "small")),
                )
                .unwrap();
            Self {
                world,
                catalog: Catalog::from_toml_str(CATALOG).unwrap(),
                functions: FunctionRegistry::with_builtins(),
                agent,
            }
        }

        fn place(&mut self, name: &str, attrs: Attributes) -> EntityId {
            self.world
                .add_item(Item::new(name, Placement::Room(RoomId::new("yard"))).with_attributes(attrs))
                .unwrap()
        }

        fn apply(&mut self, effects: &[Effect], params: &Params) -> Result<EffectOutcome, RulesError> {
            let ctx = EffectContext {
                catalog: &self.catalog,
                functions: &self.functions,
            };
            apply(&mut self.world, &ctx, self.agent, effects, params)
        }

        fn agent(&self) -> &Agent {
            self.world.agent(self.agent).unwrap()
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn object_param() -> TargetRef {
        TargetRef::Parameter("object_name".to_string())
    }

    #[test]
    fn test_tag_and_property_effects() {
        let mut fx = Fixture::new();
        let effects = vec![
            Effect::AddTag {
                target: None,
                tag: "muddy".to_string(),
            },
            Effect::IncrementProperty {
                target: None,
                property: "steps".to_string(),
                amount: PropertyValue::Int(2),
            },
            Effect::SetProperty {
                target: Some(TargetRef::Room),
                property: "visitor".to_string(),
                value: PropertyValue::from("{{player_name}}"),
            },
        ];

        let outcome = fx.apply(&effects, &Params::new()).unwrap();

        assert!(matches!(outcome, EffectOutcome::Applied { .. }));
        assert!(fx.agent().has_tag("muddy"));
        assert_eq!(fx.agent().attributes.property("steps"), Some(&PropertyValue::Int(2)));
        let yard = fx.world.room(&RoomId::new("yard")).unwrap();
        assert_eq!(yard.attributes.text("visitor"), Some("Wren"));
    }

    #[test]
    fn test_refusal_leaves_world_untouched() {
        let mut fx = Fixture::new();
        fx.place("Large Sword", Attributes::new().with_property("required_size", "large"));
        let effects = vec![
            Effect::AddTag {
                target: None,
                tag: "tried".to_string(),
            },
            Effect::TakeItem { object: object_param() },
        ];

        let outcome = fx
            .apply(&effects, &params(&[("object_name", "large sword")]))
            .unwrap();

        let EffectOutcome::Refused { feedback, event } = outcome else {
            panic!("expected refusal");
        };
        assert!(feedback.contains("small") && feedback.contains("large"));
        assert_eq!(event.unwrap().scope, Scope::Room);
        assert!(!fx.agent().has_tag("tried"));
        assert!(fx.world.find_inventory_item(fx.agent, "large sword").is_none());
    }

    #[test]
    fn test_error_rolls_back() {
        let mut fx = Fixture::new();
        let effects = vec![
            Effect::AddTag {
                target: None,
                tag: "marked".to_string(),
            },
            Effect::Invoke {
                function: "does_not_exist".to_string(),
                args: Args::new(),
            },
        ];
        assert!(fx.apply(&effects, &Params::new()).is_err());
        assert!(!fx.agent().has_tag("marked"));
    }

    #[test]
    fn test_take_and_drop() {
        let mut fx = Fixture::new();
        fx.place("Lantern", Attributes::new().with_property("size", "small"));
        let p = params(&[("object_name", "lantern")]);

        fx.apply(&[Effect::TakeItem { object: object_param() }], &p).unwrap();
        assert!(fx.world.find_inventory_item(fx.agent, "lantern").is_some());

        let again = fx.apply(&[Effect::TakeItem { object: object_param() }], &p).unwrap();
        assert!(matches!(again, EffectOutcome::Refused { .. }));

        fx.apply(&[Effect::DropItem { object: object_param() }], &p).unwrap();
        assert!(fx.world.find_room_item(&RoomId::new("yard"), "lantern").is_some());
    }

    #[test]
    fn test_give_item_checks_recipient_capacity() {
        let mut fx = Fixture::new();
        let bale = Item::new("Hay Bale", Placement::Agent(fx.agent))
            .with_attributes(Attributes::new().with_property("size", "large"));
        fx.world.add_item(bale).unwrap();
        let friend = fx
            .world
            .add_agent(
                Agent::new("Moss", RoomId::new("yard"))
                    .with_attributes(Attributes::new().with_property("capacity", 2i64)),
            )
            .unwrap();

        let give = Effect::GiveItem {
            object: object_param(),
            recipient: TargetRef::Parameter("target".to_string()),
        };
        let p = params(&[("object_name", "hay bale"), ("target", "moss")]);
        let outcome = fx.apply(&[give], &p).unwrap();

        assert!(matches!(outcome, EffectOutcome::Refused { .. }));
        assert!(fx.world.inventory_of(friend).is_empty());
        assert_eq!(fx.world.inventory_of(fx.agent).len(), 1);
    }

    #[test]
    fn test_move_through_exit() {
        let mut fx = Fixture::new();
        let go = Effect::Move {
            direction: None,
            parameter: Some("direction".to_string()),
        };

        let blocked = fx.apply(&[go.clone()], &params(&[("direction", "west")])).unwrap();
        assert!(matches!(blocked, EffectOutcome::Refused { .. }));

        fx.apply(&[go], &params(&[("direction", "EAST")])).unwrap();
        assert_eq!(fx.agent().location.as_str(), "barn");
    }

    #[test]
    fn test_conditional_branches() {
        let mut fx = Fixture::new();
        let effect = Effect::Conditional {
            requirement: RequirementNode::has_tag("lucky"),
            then: vec![Effect::Feedback {
                message: "Fortune smiles.".to_string(),
            }],
            otherwise: vec![Effect::Feedback {
                message: "Nothing happens.".to_string(),
            }],
        };

        let EffectOutcome::Applied { feedback, .. } = fx.apply(&[effect.clone()], &Params::new()).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(feedback, vec!["Nothing happens."]);

        fx.world.agent_mut(fx.agent).unwrap().attributes.add_tag("lucky");
        let EffectOutcome::Applied { feedback, .. } = fx.apply(&[effect], &Params::new()).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(feedback, vec!["Fortune smiles."]);
    }

    #[test]
    fn test_emit_event_renders_templates() {
        let mut fx = Fixture::new();
        fx.world
            .agent_mut(fx.agent)
            .unwrap()
            .attributes
            .set_property("mood", PropertyValue::from("cheerful"));
        fx.place("Bucket", Attributes::new());
        let effect = Effect::EmitEvent {
            message: "{{player_name}} ({{player_property:mood}}) kicks the {{target}}{{unknown}}.".to_string(),
            category: "action".to_string(),
            scope: Scope::Room,
        };

        let EffectOutcome::Applied { events, .. } =
            fx.apply(&[effect], &params(&[("object_name", "bucket")])).unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(events[0].message, "Wren (cheerful) kicks the Bucket.");
        assert_eq!(events[0].actor, Some(fx.agent));
        assert!(events[0].related_item.is_some());
    }

    #[test]
    fn test_player_property_template_includes_statuses() {
        let mut fx = Fixture::new();
        fx.world
            .agent_mut(fx.agent)
            .unwrap()
            .attributes
            .set_property("level", PropertyValue::Int(1));
        fx.world.statuses.apply(
            fx.agent,
            crate::status::StatusEffect::new("inspired", None).with_delta("level", 2i64),
        );

        let agent = fx.agent();
        assert_eq!(
            render_template("{{player_name}} is level {{player_property:level}}.", agent, &fx.world, &Params::new()),
            "Wren is level 3."
        );
    }

    #[test]
    fn test_spawn_into_inventory_and_destroy() {
        let mut fx = Fixture::new();
        let spawn = Effect::Spawn {
            object_type: "coin".to_string(),
            into_inventory: true,
            properties: BTreeMap::new(),
        };
        fx.apply(&[spawn], &Params::new()).unwrap();
        assert!(fx.world.find_inventory_item(fx.agent, "gold coin").is_some());

        let destroy = Effect::Destroy {
            object: TargetRef::Named("Gold Coin".to_string()),
            reason: Some("spent".to_string()),
        };
        fx.apply(&[destroy], &Params::new()).unwrap();
        assert!(fx.world.inventory_of(fx.agent).is_empty());
    }

    #[test]
    fn test_destroy_waits_for_the_rest_of_the_list() {
        let mut fx = Fixture::new();
        let scroll = fx.place("Scroll", Attributes::new());
        let effects = vec![
            Effect::Destroy {
                object: object_param(),
                reason: Some("burned".to_string()),
            },
            Effect::AddTag {
                target: Some(object_param()),
                tag: "ashes".to_string(),
            },
        ];

        let outcome = fx.apply(&effects, &params(&[("object_name", "scroll")])).unwrap();

        assert!(matches!(outcome, EffectOutcome::Applied { .. }));
        assert!(fx.world.find_room_item(&RoomId::new("yard"), "scroll").is_none());
        let scroll = fx.world.items.get(&scroll).unwrap();
        assert_eq!(scroll.destroyed.as_deref(), Some("burned"));
        assert!(scroll.attributes.has_tag("ashes"));
    }

    #[test]
    fn test_refused_list_does_not_destroy() {
        let mut fx = Fixture::new();
        fx.place("Scroll", Attributes::new());
        let effects = vec![
            Effect::Destroy {
                object: object_param(),
                reason: None,
            },
            Effect::Move {
                direction: Some("west".to_string()),
                parameter: None,
            },
        ];

        let outcome = fx.apply(&effects, &params(&[("object_name", "scroll")])).unwrap();

        assert!(matches!(outcome, EffectOutcome::Refused { .. }));
        assert!(fx.world.find_room_item(&RoomId::new("yard"), "scroll").is_some());
    }

    #[test]
    fn test_invoke_collects_output() {
        let mut fx = Fixture::new();
        fx.functions.register_effect("whistle", |_world, _agent, _params, _args| {
            Ok(FunctionOutput {
                events: Vec::new(),
                feedback: vec!["You whistle a tune.".to_string()],
            })
        });
        let EffectOutcome::Applied { feedback, .. } = fx
            .apply(
                &[Effect::Invoke {
                    function: "whistle".to_string(),
                    args: Args::new(),
                }],
                &Params::new(),
            )
            .unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(feedback, vec!["You whistle a tune."]);
    }

    #[test]
    fn test_effects_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            effects: Vec<Effect>,
        }
        let doc: Doc = toml::from_str(
            r#"
            effects = [
                { kind = "take_item", object = { parameter = "object_name" } },
                { kind = "emit_event", message = "{{player_name}} takes it.", scope = "room" },
                { kind = "increment_property", property = "score" },
                { kind = "apply_status", status = { name = "tired", duration = 2 } },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(doc.effects.len(), 4);
        assert!(matches!(
            &doc.effects[2],
            Effect::IncrementProperty { amount: PropertyValue::Int(1), .. }
        ));
        let params: BTreeSet<String> = doc.effects.iter().flat_map(Effect::referenced_parameters).collect();
        assert!(params.contains("object_name"));
    }
}
