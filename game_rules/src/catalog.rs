//! The world catalog: immutable templates for actions, rooms, objects,
//! characters and motives, keyed by id.
//!
//! Catalogs are authored in TOML and validated as a whole on load, so a
//! malformed definition is rejected before any turn runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

use crate::effects::Effect;
use crate::entities::{Agent, Attributes, Exit, Item, Placement, Room, RoomId};
use crate::error::RulesError;
use crate::requirements::RequirementNode;
use crate::value::PropertyValue;
use crate::world_state::World;

/// AP cost of an action: a fixed amount or a named cost function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApCost {
    Fixed(u32),
    Dynamic(String),
}

impl Default for ApCost {
    fn default() -> Self {
        ApCost::Fixed(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    #[default]
    General,
    Movement,
    Item,
    Speech,
    /// Speech directed at a named listener: `tell <target> "<message>"`.
    AddressedSpeech,
    Meta,
}

/// One declared action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A catalog verb.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub cost: ApCost,
    pub parameters: Vec<ParameterSpec>,
    pub requirements: Option<RequirementNode>,
    pub effects: Vec<Effect>,
    pub category: ActionCategory,
}

impl ActionDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            cost: ApCost::default(),
            parameters: Vec::new(),
            requirements: None,
            effects: Vec::new(),
            category: ActionCategory::default(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            description: None,
        });
        self
    }

    pub fn with_requirements(mut self, node: RequirementNode) -> Self {
        self.requirements = Some(node);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_cost(mut self, cost: ApCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    fn validate(&self) -> Result<(), RulesError> {
        let declared: BTreeSet<&str> = self.parameter_names().collect();
        let mut referenced = self
            .requirements
            .as_ref()
            .map(RequirementNode::referenced_parameters)
            .unwrap_or_default();
        for effect in &self.effects {
            referenced.extend(effect.referenced_parameters());
        }
        match referenced.iter().find(|p| !declared.contains(p.as_str())) {
            Some(parameter) => Err(RulesError::UnknownParameter {
                action: self.id.clone(),
                parameter: parameter.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Template for items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub interactions: BTreeMap<String, Vec<Effect>>,
    #[serde(default)]
    pub verb_aliases: BTreeMap<String, String>,
}

impl ObjectType {
    /// Build a fresh item from this template.
    pub fn instantiate(&self, placement: Placement) -> Item {
        let mut item = Item::new(self.name.clone(), placement);
        item.definition_id = Some(self.id.clone());
        item.description = self.description.clone();
        item.attributes = Attributes {
            tags: self.tags.clone(),
            properties: self.properties.clone(),
        };
        item.interactions = self.interactions.clone();
        item.verb_aliases = self.verb_aliases.clone();
        item
    }
}

/// Template for agents' characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterType {
    pub id: String,
    #[serde(default)]
    pub start_room: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// An item placed in a room when the world is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomItem {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// Template for rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub items: Vec<RoomItem>,
}

/// A status prompt, shown when its gate passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPrompt {
    pub text: String,
    pub when: Option<RequirementNode>,
}

/// An agent's private goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Motive {
    pub id: String,
    pub description: String,
    pub success: Option<RequirementNode>,
    pub failure: Option<RequirementNode>,
    pub status_prompts: Vec<StatusPrompt>,
    /// Fallback prompt while failing.
    pub failing_prompt: Option<String>,
    /// Fallback prompt while succeeding and not failing.
    pub succeeding_prompt: Option<String>,
}

impl Motive {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            success: None,
            failure: None,
            status_prompts: Vec::new(),
            failing_prompt: None,
            succeeding_prompt: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawParameter {
    Name(String),
    Spec(ParameterSpec),
}

#[derive(Debug, Deserialize)]
struct RawAction {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cost: ApCost,
    #[serde(default)]
    parameters: Vec<RawParameter>,
    #[serde(default)]
    requirements: Option<Value>,
    #[serde(default)]
    effects: Vec<Effect>,
    #[serde(default)]
    category: ActionCategory,
}

#[derive(Debug, Deserialize)]
struct RawStatusPrompt {
    text: String,
    #[serde(default)]
    when: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMotive {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    success: Option<Value>,
    #[serde(default)]
    failure: Option<Value>,
    #[serde(default)]
    status_prompts: Vec<RawStatusPrompt>,
    #[serde(default)]
    failing_prompt: Option<String>,
    #[serde(default)]
    succeeding_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawCatalog {
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    rooms: Vec<RoomDefinition>,
    #[serde(default)]
    object_types: Vec<ObjectType>,
    #[serde(default)]
    character_types: Vec<CharacterType>,
    #[serde(default)]
    motives: Vec<RawMotive>,
}

/// Read-only arena of world templates.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    actions: BTreeMap<String, ActionDefinition>,
    rooms: BTreeMap<String, RoomDefinition>,
    object_types: BTreeMap<String, ObjectType>,
    character_types: BTreeMap<String, CharacterType>,
    motives: BTreeMap<String, Motive>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(text: &str) -> Result<Self, RulesError> {
        let raw: RawCatalog = toml::from_str(text)?;
        let mut catalog = Catalog::new();

        for object in raw.object_types {
            catalog.add_object_type(object)?;
        }
        for room in raw.rooms {
            catalog.add_room(room)?;
        }
        for character in raw.character_types {
            catalog.add_character_type(character)?;
        }
        for action in raw.actions {
            catalog.add_action(convert_action(action)?)?;
        }
        for motive in raw.motives {
            catalog.add_motive(convert_motive(motive)?)?;
        }

        catalog.validate_references()?;
        Ok(catalog)
    }

    /// Load a TOML catalog from disk.
    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn add_action(&mut self, action: ActionDefinition) -> Result<(), RulesError> {
        action.validate()?;
        if let Some(node) = &action.requirements {
            for kind in node.unhandled_kinds() {
                warn!(action = %action.id, kind, "action uses a requirement kind with no built-in handler");
            }
        }
        insert_unique(&mut self.actions, "action", action.id.clone(), action)
    }

    pub fn add_object_type(&mut self, object: ObjectType) -> Result<(), RulesError> {
        insert_unique(&mut self.object_types, "object type", object.id.clone(), object)
    }

    pub fn add_room(&mut self, room: RoomDefinition) -> Result<(), RulesError> {
        insert_unique(&mut self.rooms, "room", room.id.clone(), room)
    }

    pub fn add_character_type(&mut self, character: CharacterType) -> Result<(), RulesError> {
        insert_unique(&mut self.character_types, "character type", character.id.clone(), character)
    }

    pub fn add_motive(&mut self, motive: Motive) -> Result<(), RulesError> {
        insert_unique(&mut self.motives, "motive", motive.id.clone(), motive)
    }

    pub fn action(&self, id: &str) -> Option<&ActionDefinition> {
        self.actions.get(id)
    }

    /// All actions, ordered by id.
    pub fn actions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.values()
    }

    pub fn object_type(&self, id: &str) -> Result<&ObjectType, RulesError> {
        self.object_types.get(id).ok_or_else(|| unknown("object type", id))
    }

    pub fn room_definition(&self, id: &str) -> Result<&RoomDefinition, RulesError> {
        self.rooms.get(id).ok_or_else(|| unknown("room", id))
    }

    pub fn character_type(&self, id: &str) -> Result<&CharacterType, RulesError> {
        self.character_types.get(id).ok_or_else(|| unknown("character type", id))
    }

    pub fn motive(&self, id: &str) -> Result<&Motive, RulesError> {
        self.motives.get(id).ok_or_else(|| unknown("motive", id))
    }

    /// Build a world holding every catalog room and its initial items.
    pub fn build_world(&self) -> Result<World, RulesError> {
        let mut world = World::new();
        for def in self.rooms.values() {
            let mut room = Room::new(def.id.clone(), def.name.clone());
            room.description = def.description.clone();
            room.exits = def.exits.clone();
            room.attributes = Attributes {
                tags: def.tags.clone(),
                properties: def.properties.clone(),
            };
            world.add_room(room);
        }
        for def in self.rooms.values() {
            for placed in &def.items {
                let mut item = self
                    .object_type(&placed.object_type)?
                    .instantiate(Placement::Room(RoomId::new(def.id.clone())));
                item.attributes.properties.extend(placed.properties.clone());
                world.add_item(item)?;
            }
        }
        Ok(world)
    }

    /// Create an agent from a character type. `room` overrides the type's start room.
    pub fn create_agent(
        &self,
        character_type: &str,
        name: impl Into<String>,
        room: Option<RoomId>,
    ) -> Result<Agent, RulesError> {
        let template = self.character_type(character_type)?;
        let location = room
            .or_else(|| template.start_room.clone().map(RoomId::new))
            .ok_or_else(|| RulesError::UnknownRoom(format!("start room for `{}`", character_type)))?;
        let mut agent = Agent::new(name, location);
        agent.character_type = Some(template.id.clone());
        agent.attributes = Attributes {
            tags: template.tags.clone(),
            properties: template.properties.clone(),
        };
        Ok(agent)
    }

    fn validate_references(&self) -> Result<(), RulesError> {
        for room in self.rooms.values() {
            for exit in &room.exits {
                if !self.rooms.contains_key(exit.target.as_str()) {
                    return Err(unknown("room", exit.target.as_str()));
                }
            }
            for placed in &room.items {
                self.object_type(&placed.object_type)?;
            }
        }
        for character in self.character_types.values() {
            if let Some(start) = &character.start_room {
                self.room_definition(start)?;
            }
        }
        Ok(())
    }
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    kind: &'static str,
    id: String,
    value: T,
) -> Result<(), RulesError> {
    if map.contains_key(&id) {
        return Err(RulesError::DuplicateId { kind, id });
    }
    map.insert(id, value);
    Ok(())
}

fn unknown(kind: &'static str, id: &str) -> RulesError {
    RulesError::UnknownDefinition {
        kind,
        id: id.to_string(),
    }
}

/// Turn an authored requirement into a tree. A bare list is only accepted
/// with zero or one entries; longer lists must name their combinator.
pub fn requirement_from_value(value: Value, context: &str) -> Result<Option<RequirementNode>, RulesError> {
    let value = match value {
        Value::Array(mut items) => match items.len() {
            0 => return Ok(None),
            1 => items.remove(0),
            count => {
                return Err(RulesError::MissingCombinator {
                    context: context.to_string(),
                    count,
                })
            }
        },
        other => other,
    };
    RequirementNode::try_from(value)
        .map(Some)
        .map_err(|reason| RulesError::InvalidRequirement {
            context: context.to_string(),
            reason,
        })
}

fn optional_requirement(value: Option<Value>, context: &str) -> Result<Option<RequirementNode>, RulesError> {
    match value {
        Some(value) => requirement_from_value(value, context),
        None => Ok(None),
    }
}

fn convert_action(raw: RawAction) -> Result<ActionDefinition, RulesError> {
    let context = format!("action `{}`", raw.id);
    Ok(ActionDefinition {
        name: raw.name.unwrap_or_else(|| raw.id.clone()),
        requirements: optional_requirement(raw.requirements, &context)?,
        description: raw.description,
        cost: raw.cost,
        parameters: raw
            .parameters
            .into_iter()
            .map(|p| match p {
                RawParameter::Name(name) => ParameterSpec {
                    name,
                    description: None,
                },
                RawParameter::Spec(spec) => spec,
            })
            .collect(),
        effects: raw.effects,
        category: raw.category,
        id: raw.id,
    })
}

fn convert_motive(raw: RawMotive) -> Result<Motive, RulesError> {
    let context = format!("motive `{}`", raw.id);
    let status_prompts = raw
        .status_prompts
        .into_iter()
        .enumerate()
        .map(|(i, prompt)| {
            Ok(StatusPrompt {
                when: optional_requirement(prompt.when, &format!("{} status prompt {}", context, i))?,
                text: prompt.text,
            })
        })
        .collect::<Result<Vec<_>, RulesError>>()?;

    Ok(Motive {
        success: optional_requirement(raw.success, &format!("{} success", context))?,
        failure: optional_requirement(raw.failure, &format!("{} failure", context))?,
        description: raw.description,
        status_prompts,
        failing_prompt: raw.failing_prompt,
        succeeding_prompt: raw.succeeding_prompt,
        id: raw.id,
    })
}
