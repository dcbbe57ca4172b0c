//! Requirement trees and their evaluator.
//!
//! A requirement tree is an AND/OR expression over leaf predicates. Trees
//! gate actions, gate conditional effects, and describe motive success,
//! failure and status-prompt conditions.
//!
//! Leaf kinds form a closed enum. A kind this engine does not know is kept
//! as [`Condition::Unhandled`] rather than rejected, and evaluating it yields
//! [`Outcome::Unhandled`] so the caller can run its own fallback.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::entities::{Agent, Attributes, EntityId, Item, Room, RoomId};
use crate::inventory;
use crate::value::PropertyValue;
use crate::world_state::World;

/// Action parameters by name, as produced by the command parser.
pub type Params = BTreeMap<String, String>;

/// Parameters that conventionally name "the thing acted on", in lookup order.
pub const OBJECT_PARAMETERS: &[&str] = &["target", "object_name", "object"];

/// The first conventional object parameter present in `params`.
pub fn object_parameter(params: &Params) -> Option<&str> {
    OBJECT_PARAMETERS
        .iter()
        .find_map(|p| params.get(*p))
        .map(String::as_str)
}

/// Leaf kinds this evaluator understands.
const KNOWN_KINDS: &[&str] = &[
    "has_tag",
    "lacks_tag",
    "property",
    "object_in_room",
    "object_in_inventory",
    "exit_exists",
    "target_tag",
    "target_property",
];

/// A node of a requirement tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum RequirementNode {
    Group(Group),
    Leaf(Leaf),
}

/// Boolean combinator over ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub op: GroupOp,
    pub children: Vec<RequirementNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    And,
    Or,
}

/// A single predicate plus its authored texts.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub condition: Condition,
    /// Shown to the agent when this leaf fails.
    pub message: Option<String>,
    /// One-shot progress narration when this leaf first turns true in a motive.
    pub narrative: Option<String>,
}

/// Which of the acting agent's surroundings a tag/property leaf inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    #[default]
    Agent,
    Room,
}

/// How an entity is located for target predicates and effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    /// The acting agent.
    Agent,
    /// The acting agent's current room.
    Room,
    /// An entity id (uuid) or a room id.
    Id(String),
    /// The value of a named action parameter, resolved as a name.
    Parameter(String),
    /// A literal entity name.
    Named(String),
}

/// Comparison operators for property leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "==", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = ">=", alias = "ge")]
    Ge,
    #[serde(rename = "<=", alias = "le")]
    Le,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<", alias = "lt")]
    Lt,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

/// Leaf predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    HasTag {
        #[serde(default)]
        on: Subject,
        tag: String,
    },
    LacksTag {
        #[serde(default)]
        on: Subject,
        tag: String,
    },
    Property {
        #[serde(default)]
        on: Subject,
        property: String,
        #[serde(default)]
        operator: Operator,
        value: PropertyValue,
    },
    ObjectInRoom {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        parameter: Option<String>,
    },
    ObjectInInventory {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        parameter: Option<String>,
    },
    ExitExists {
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        parameter: Option<String>,
    },
    TargetTag {
        #[serde(default)]
        target: Option<TargetRef>,
        tag: String,
    },
    TargetProperty {
        #[serde(default)]
        target: Option<TargetRef>,
        property: String,
        #[serde(default)]
        operator: Operator,
        value: PropertyValue,
    },
    /// A kind this evaluator does not know, kept with its raw payload.
    #[serde(skip)]
    Unhandled { kind: String, payload: Value },
}

/// Result of evaluating a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail(String),
    /// The named leaf kind is not understood; the caller decides.
    Unhandled(String),
}

impl Outcome {
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl RequirementNode {
    pub fn and(children: Vec<RequirementNode>) -> Self {
        RequirementNode::Group(Group {
            op: GroupOp::And,
            children,
        })
    }

    pub fn or(children: Vec<RequirementNode>) -> Self {
        RequirementNode::Group(Group {
            op: GroupOp::Or,
            children,
        })
    }

    pub fn leaf(condition: Condition) -> Self {
        RequirementNode::Leaf(Leaf {
            condition,
            message: None,
            narrative: None,
        })
    }

    /// Convenience for the most common leaf: the agent has a tag.
    pub fn has_tag(tag: impl Into<String>) -> Self {
        Self::leaf(Condition::HasTag {
            on: Subject::Agent,
            tag: tag.into(),
        })
    }

    /// Attach a failure message to a leaf. Groups are returned unchanged.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let RequirementNode::Leaf(leaf) = &mut self {
            leaf.message = Some(text.into());
        }
        self
    }

    /// Attach a progress narrative to a leaf. Groups are returned unchanged.
    pub fn with_narrative(mut self, text: impl Into<String>) -> Self {
        if let RequirementNode::Leaf(leaf) = &mut self {
            leaf.narrative = Some(text.into());
        }
        self
    }

    /// All leaves with their tree paths (`"0"`, `"0.1"`, ...), depth first.
    pub fn leaves(&self) -> Vec<(String, &Leaf)> {
        let mut out = Vec::new();
        self.collect_leaves(String::from("0"), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: String, out: &mut Vec<(String, &'a Leaf)>) {
        match self {
            RequirementNode::Leaf(leaf) => out.push((path, leaf)),
            RequirementNode::Group(group) => {
                for (i, child) in group.children.iter().enumerate() {
                    child.collect_leaves(format!("{}.{}", path, i), out);
                }
            }
        }
    }

    /// Names of action parameters referenced anywhere in the tree.
    pub fn referenced_parameters(&self) -> BTreeSet<String> {
        self.leaves()
            .into_iter()
            .filter_map(|(_, leaf)| leaf.condition.parameter().map(str::to_string))
            .collect()
    }

    /// Leaf kinds in the tree that the evaluator does not understand.
    pub fn unhandled_kinds(&self) -> Vec<&str> {
        self.leaves()
            .into_iter()
            .filter_map(|(_, leaf)| match &leaf.condition {
                Condition::Unhandled { kind, .. } => Some(kind.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Leaf {
    /// Stable identity of this leaf inside a tree: its path plus its
    /// predicate payload. Authored texts are excluded, so rewording a
    /// narrative does not reset progress.
    pub fn stable_key(&self, path: &str) -> String {
        format!("{}:{}", path, self.condition.to_value())
    }
}

impl Condition {
    pub fn kind(&self) -> &str {
        match self {
            Condition::HasTag { .. } => "has_tag",
            Condition::LacksTag { .. } => "lacks_tag",
            Condition::Property { .. } => "property",
            Condition::ObjectInRoom { .. } => "object_in_room",
            Condition::ObjectInInventory { .. } => "object_in_inventory",
            Condition::ExitExists { .. } => "exit_exists",
            Condition::TargetTag { .. } => "target_tag",
            Condition::TargetProperty { .. } => "target_property",
            Condition::Unhandled { kind, .. } => kind,
        }
    }

    /// The action parameter this leaf reads, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Condition::ObjectInRoom { parameter, .. }
            | Condition::ObjectInInventory { parameter, .. }
            | Condition::ExitExists { parameter, .. } => parameter.as_deref(),
            Condition::TargetTag {
                target: Some(TargetRef::Parameter(p)),
                ..
            }
            | Condition::TargetProperty {
                target: Some(TargetRef::Parameter(p)),
                ..
            } => Some(p),
            _ => None,
        }
    }

    /// Canonical JSON payload of the predicate.
    pub fn to_value(&self) -> Value {
        match self {
            Condition::Unhandled { kind, payload } => {
                let mut map = match payload {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                map.insert("kind".to_string(), Value::String(kind.clone()));
                Value::Object(map)
            }
            known => serde_json::to_value(known).unwrap_or(Value::Null),
        }
    }
}

impl TryFrom<Value> for RequirementNode {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err("a requirement must be a table".to_string());
        };
        let kind = map
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| "requirement is missing `kind`".to_string())?
            .to_ascii_lowercase();

        match kind.as_str() {
            "and" | "or" => {
                let children = match map.remove("children") {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .map(RequirementNode::try_from)
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(_) => return Err(format!("`{}` children must be a list", kind)),
                };
                let op = if kind == "and" { GroupOp::And } else { GroupOp::Or };
                Ok(RequirementNode::Group(Group { op, children }))
            }
            _ => {
                let message = take_text(&mut map, "message")?;
                let narrative = take_text(&mut map, "narrative")?;
                let condition = if KNOWN_KINDS.contains(&kind.as_str()) {
                    map.insert("kind".to_string(), Value::String(kind.clone()));
                    serde_json::from_value(Value::Object(map))
                        .map_err(|e| format!("`{}` leaf: {}", kind, e))?
                } else {
                    map.remove("kind");
                    Condition::Unhandled {
                        kind,
                        payload: Value::Object(map),
                    }
                };
                Ok(RequirementNode::Leaf(Leaf {
                    condition,
                    message,
                    narrative,
                }))
            }
        }
    }
}

fn take_text(map: &mut Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match map.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(format!("`{}` must be a string", key)),
    }
}

impl From<RequirementNode> for Value {
    fn from(node: RequirementNode) -> Self {
        match node {
            RequirementNode::Group(group) => {
                let kind = match group.op {
                    GroupOp::And => "and",
                    GroupOp::Or => "or",
                };
                let children = group.children.into_iter().map(Value::from).collect();
                serde_json::json!({ "kind": kind, "children": Value::Array(children) })
            }
            RequirementNode::Leaf(leaf) => {
                let mut value = leaf.condition.to_value();
                if let Value::Object(map) = &mut value {
                    if let Some(message) = leaf.message {
                        map.insert("message".to_string(), Value::String(message));
                    }
                    if let Some(narrative) = leaf.narrative {
                        map.insert("narrative".to_string(), Value::String(narrative));
                    }
                }
                value
            }
        }
    }
}

/// A resolved entity of any kind.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Agent(&'a Agent),
    Item(&'a Item),
    Room(&'a Room),
}

impl<'a> EntityRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Agent(a) => &a.name,
            EntityRef::Item(i) => &i.name,
            EntityRef::Room(r) => &r.name,
        }
    }

    pub fn attributes(&self) -> &'a Attributes {
        match self {
            EntityRef::Agent(a) => &a.attributes,
            EntityRef::Item(i) => &i.attributes,
            EntityRef::Room(r) => &r.attributes,
        }
    }
}

/// Resolve a literal text or a named parameter to text.
pub fn resolve_text(literal: Option<&str>, parameter: Option<&str>, params: &Params) -> Option<String> {
    match parameter {
        Some(p) => params.get(p).cloned(),
        None => literal.map(str::to_string),
    }
}

/// Locate an entity by name: items the agent can see, then agents in the same room.
pub fn resolve_named<'a>(agent: &Agent, world: &'a World, name: &str) -> Option<EntityRef<'a>> {
    if let Some(item) = world.find_visible_item(agent, name) {
        return Some(EntityRef::Item(item));
    }
    world
        .find_agent_in_room(&agent.location, name)
        .map(EntityRef::Agent)
}

/// Resolve a target reference. `None` means the current room.
pub fn resolve_target<'a>(
    agent: &Agent,
    world: &'a World,
    target: Option<&TargetRef>,
    params: &Params,
) -> Option<EntityRef<'a>> {
    match target {
        None | Some(TargetRef::Room) => world.room(&agent.location).map(EntityRef::Room),
        Some(TargetRef::Agent) => world.agent(agent.id).map(EntityRef::Agent),
        Some(TargetRef::Id(id)) => match EntityId::parse(id) {
            Some(eid) => world
                .agent(eid)
                .map(EntityRef::Agent)
                .or_else(|| world.active_item(eid).map(EntityRef::Item)),
            None => world.room(&RoomId::new(id.as_str())).map(EntityRef::Room),
        },
        Some(TargetRef::Parameter(p)) => {
            let name = params.get(p)?;
            resolve_named(agent, world, name)
        }
        Some(TargetRef::Named(name)) => resolve_named(agent, world, name),
    }
}

/// Host-supplied decision for leaf kinds the evaluator does not know.
/// Returning `None` leaves the leaf unhandled.
pub type Fallback<'f> = &'f dyn Fn(&str, &Value, &Agent, &World, &Params) -> Option<bool>;

/// Evaluate a requirement tree for `agent`.
///
/// AND passes iff every child passes (an empty AND passes); OR passes iff
/// some child passes (an empty OR fails). A failing group reports the first
/// failing child's message. An unhandled leaf is reported only when no
/// sibling decides the group.
pub fn evaluate(agent: &Agent, world: &World, node: &RequirementNode, params: &Params) -> Outcome {
    evaluate_with(agent, world, node, params, None)
}

/// [`evaluate`], consulting `fallback` for unknown leaf kinds first.
pub fn evaluate_with(
    agent: &Agent,
    world: &World,
    node: &RequirementNode,
    params: &Params,
    fallback: Option<Fallback<'_>>,
) -> Outcome {
    match node {
        RequirementNode::Group(group) => {
            let mut first_failure = None;
            let mut first_unhandled = None;
            for child in &group.children {
                match evaluate_with(agent, world, child, params, fallback) {
                    Outcome::Pass if group.op == GroupOp::Or => return Outcome::Pass,
                    Outcome::Fail(message) if group.op == GroupOp::And => return Outcome::Fail(message),
                    Outcome::Pass => {}
                    Outcome::Fail(message) => {
                        first_failure.get_or_insert(message);
                    }
                    Outcome::Unhandled(kind) => {
                        first_unhandled.get_or_insert(kind);
                    }
                }
            }
            match (first_unhandled, group.op) {
                (Some(kind), _) => Outcome::Unhandled(kind),
                (None, GroupOp::And) => Outcome::Pass,
                (None, GroupOp::Or) => {
                    Outcome::Fail(first_failure.unwrap_or_else(|| "No option is satisfied.".to_string()))
                }
            }
        }
        RequirementNode::Leaf(leaf) => evaluate_leaf(agent, world, leaf, params, fallback),
    }
}

fn evaluate_leaf(
    agent: &Agent,
    world: &World,
    leaf: &Leaf,
    params: &Params,
    fallback: Option<Fallback<'_>>,
) -> Outcome {
    let verdict = match &leaf.condition {
        Condition::Unhandled { kind, payload } => {
            match fallback.and_then(|decide| decide(kind, payload, agent, world, params)) {
                Some(passed) => check(passed, || format!("The {} condition is not met.", kind)),
                None => return Outcome::Unhandled(kind.clone()),
            }
        }
        Condition::HasTag { on, tag } => check(
            subject_attributes(agent, world, *on).is_some_and(|a| a.has_tag(tag)),
            || format!("Requires {} to be {}.", subject_label(*on), tag),
        ),
        Condition::LacksTag { on, tag } => check(
            !subject_attributes(agent, world, *on).is_some_and(|a| a.has_tag(tag)),
            || format!("Requires {} not to be {}.", subject_label(*on), tag),
        ),
        Condition::Property {
            on,
            property,
            operator,
            value,
        } => {
            let actual = match on {
                Subject::Agent => agent_property(agent, world, property),
                Subject::Room => world
                    .room(&agent.location)
                    .and_then(|r| r.attributes.property(property).cloned()),
            };
            check(compare(actual.as_ref(), *operator, value), || {
                format!(
                    "Requires {} {} {} {}.",
                    subject_label(*on),
                    property,
                    operator.symbol(),
                    value
                )
            })
        }
        Condition::ObjectInRoom { name, parameter } => {
            match resolve_text(name.as_deref(), parameter.as_deref(), params) {
                Some(name) => check(world.find_room_item(&agent.location, &name).is_some(), || {
                    format!("There is no {} here.", name)
                }),
                None => Err("No object was named.".to_string()),
            }
        }
        Condition::ObjectInInventory { name, parameter } => {
            match resolve_text(name.as_deref(), parameter.as_deref(), params) {
                Some(name) => check(world.find_inventory_item(agent.id, &name).is_some(), || {
                    format!("You are not carrying {}.", name)
                }),
                None => Err("No object was named.".to_string()),
            }
        }
        Condition::ExitExists { direction, parameter } => {
            match resolve_text(direction.as_deref(), parameter.as_deref(), params) {
                Some(direction) => check(
                    world
                        .room(&agent.location)
                        .and_then(|r| r.find_exit(&direction))
                        .is_some(),
                    || format!("You can't go {} from here.", direction),
                ),
                None => Err("No direction was given.".to_string()),
            }
        }
        Condition::TargetTag { target, tag } => {
            match resolve_target(agent, world, target.as_ref(), params) {
                Some(entity) => check(entity.attributes().has_tag(tag), || {
                    format!("{} is not {}.", entity.name(), tag)
                }),
                None => Err(unresolved(target.as_ref(), params)),
            }
        }
        Condition::TargetProperty {
            target,
            property,
            operator,
            value,
        } => match resolve_target(agent, world, target.as_ref(), params) {
            Some(entity) => check(
                compare(entity.attributes().property(property), *operator, value),
                || {
                    format!(
                        "{} must have {} {} {}.",
                        entity.name(),
                        property,
                        operator.symbol(),
                        value
                    )
                },
            ),
            None => Err(unresolved(target.as_ref(), params)),
        },
    };

    match verdict {
        Ok(()) => Outcome::Pass,
        Err(default_message) => Outcome::Fail(leaf.message.clone().unwrap_or(default_message)),
    }
}

fn check(passed: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if passed {
        Ok(())
    } else {
        Err(message())
    }
}

fn unresolved(target: Option<&TargetRef>, params: &Params) -> String {
    match target {
        Some(TargetRef::Parameter(p)) => match params.get(p) {
            Some(name) => format!("You don't see {} here.", name),
            None => "Nothing was named.".to_string(),
        },
        Some(TargetRef::Named(name)) => format!("You don't see {} here.", name),
        _ => "That isn't here.".to_string(),
    }
}

fn subject_attributes<'a>(agent: &'a Agent, world: &'a World, on: Subject) -> Option<&'a Attributes> {
    match on {
        Subject::Agent => Some(&agent.attributes),
        Subject::Room => world.room(&agent.location).map(|r| &r.attributes),
    }
}

fn subject_label(on: Subject) -> &'static str {
    match on {
        Subject::Agent => "you",
        Subject::Room => "this place",
    }
}

/// Agent property lookup, including values derived on demand and active
/// status deltas.
pub fn agent_property(agent: &Agent, world: &World, name: &str) -> Option<PropertyValue> {
    let derived = match name {
        "evidence_count" => Some(agent.evidence_count() as i64),
        "action_points" => Some(i64::from(agent.action_points)),
        "inventory_count" => Some(world.inventory_of(agent.id).len() as i64),
        "capacity_used" => Some(i64::from(inventory::capacity_used(world, agent.id))),
        "capacity_available" => Some(i64::from(inventory::capacity_available(world, agent))),
        _ => None,
    };
    derived.map(PropertyValue::Int).or_else(|| {
        world
            .statuses
            .effective_property(agent.id, name, agent.attributes.property(name))
    })
}

/// Compare an actual property to an expected value.
///
/// Ordering operators need both sides numeric, otherwise they fall back to
/// equality. A missing property reads as zero against a numeric expectation;
/// against anything else only `!=` holds.
pub fn compare(actual: Option<&PropertyValue>, operator: Operator, expected: &PropertyValue) -> bool {
    let zero = PropertyValue::Int(0);
    let actual = match actual {
        Some(value) => value,
        None if expected.is_numeric() => &zero,
        None => return operator == Operator::Ne,
    };

    if let Some(ordering) = actual.numeric_cmp(expected) {
        use std::cmp::Ordering::*;
        return match operator {
            Operator::Eq => ordering == Equal,
            Operator::Ne => ordering != Equal,
            Operator::Ge => ordering != Less,
            Operator::Le => ordering != Greater,
            Operator::Gt => ordering == Greater,
            Operator::Lt => ordering == Less,
        };
    }

    match operator {
        Operator::Ne => !actual.loosely_equals(expected),
        _ => actual.loosely_equals(expected),
    }
}
