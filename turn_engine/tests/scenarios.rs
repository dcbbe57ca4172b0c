//! Whole-game scenarios driven by scripted agents.

use std::collections::{BTreeMap, VecDeque};

use game_rules::{Agent, Catalog, EntityId, RoomId, RulesError};
use turn_engine::{AgentDriver, EngineConfig, FinalStatus, Game, Resolution};

const CATALOG: &str = r#"
    [[rooms]]
    id = "square"
    name = "Town Square"
    description = "Cobbles and pigeons."
    exits = [{ direction = "north", target = "hall" }]
    items = [{ type = "sword" }, { type = "anvil" }]

    [[rooms]]
    id = "hall"
    name = "Town Hall"
    tags = ["hideout"]
    exits = [{ direction = "south", target = "square" }]

    [[object_types]]
    id = "sword"
    name = "Large Sword"
    properties = { size = "large" }

    [[object_types]]
    id = "anvil"
    name = "Giant Anvil"
    properties = { size = "huge", required_size = "huge" }

    [[actions]]
    id = "pickup"
    category = "item"
    parameters = ["object_name"]
    requirements = { kind = "object_in_room", parameter = "object_name" }
    effects = [
        { kind = "take_item", object = { parameter = "object_name" } },
        { kind = "emit_event", message = "{{player_name}} picks up the {{target}}." },
    ]

    [[actions]]
    id = "hoard"
    category = "item"
    parameters = ["object_name"]
    effects = [
        { kind = "add_tag", tag = "greedy" },
        { kind = "take_item", object = { parameter = "object_name" } },
    ]

    [[actions]]
    id = "go"
    category = "movement"
    parameters = ["direction"]
    requirements = { kind = "exit_exists", parameter = "direction" }
    effects = [{ kind = "move", parameter = "direction" }]

    [[actions]]
    id = "look"
    cost = 0
    effects = [{ kind = "feedback", message = "You look around." }]

    [[actions]]
    id = "look_at"
    name = "look at"
    cost = 0
    parameters = ["target"]
    effects = [{ kind = "feedback", message = "You study {{target}}." }]

    [[actions]]
    id = "ponder"
    cost = 0
    effects = [{ kind = "emit_event", message = "{{player_name}} ponders.", scope = "self" }]

    [[actions]]
    id = "search"
    effects = [{ kind = "conditional", requirement = { kind = "has_tag", on = "room", tag = "hideout" }, then = [
        { kind = "add_tag", tag = "found_mayor" },
    ], otherwise = [
        { kind = "feedback", message = "Nobody hides here." },
    ] }]

    [[actions]]
    id = "expose"
    requirements = { kind = "has_tag", tag = "found_mayor", message = "You have nothing to expose yet." }
    effects = [{ kind = "add_tag", tag = "cult_exposed" }]

    [[actions]]
    id = "falter"
    effects = [{ kind = "add_tag", tag = "cult_succeeded" }]

    [[actions]]
    id = "read_ledger"
    name = "read ledger"
    cost = 0
    effects = [{ kind = "add_tag", tag = "evidence:ledger" }]

    [[actions]]
    id = "read_letter"
    name = "read letter"
    cost = 0
    effects = [{ kind = "add_tag", tag = "evidence:letter" }]

    [[actions]]
    id = "rally"
    effects = [{ kind = "remove_tag", tag = "cult_succeeded" }]

    [[motives]]
    id = "find_mayor"
    success = { kind = "and", children = [
        { kind = "has_tag", tag = "found_mayor", narrative = "You have found the mayor." },
        { kind = "has_tag", tag = "cult_exposed", narrative = "The cult stands exposed." },
    ] }
    failure = { kind = "or", children = [
        { kind = "has_tag", tag = "mayor_dead" },
        { kind = "has_tag", tag = "cult_succeeded" },
    ] }
"#;

/// Replays canned replies per agent and records every prompt it was shown.
#[derive(Default)]
struct Script {
    replies: BTreeMap<EntityId, VecDeque<&'static str>>,
    prompts: Vec<(EntityId, String)>,
}

impl Script {
    fn say(&mut self, agent: EntityId, reply: &'static str) {
        self.replies.entry(agent).or_default().push_back(reply);
    }

    fn last_prompt(&self, agent: EntityId) -> &str {
        self.prompts
            .iter()
            .rev()
            .find(|(who, _)| *who == agent)
            .map(|(_, prompt)| prompt.as_str())
            .unwrap()
    }
}

impl AgentDriver for Script {
    fn submit(&mut self, agent: EntityId, prompt: &str) -> String {
        self.prompts.push((agent, prompt.to_string()));
        self.replies
            .get_mut(&agent)
            .and_then(VecDeque::pop_front)
            .unwrap_or("> pass")
            .to_string()
    }
}

fn new_game() -> (Game, EntityId, EntityId) {
    let catalog = Catalog::from_toml_str(CATALOG).unwrap();
    let mut game = Game::from_catalog(catalog, EngineConfig::default()).unwrap();
    let ada = game.add_agent(Agent::new("Ada", RoomId::new("square"))).unwrap();
    let ben = game.add_agent(Agent::new("Ben", RoomId::new("square"))).unwrap();
    (game, ada, ben)
}

fn room_items(game: &Game, room: &str) -> Vec<String> {
    game.world()
        .items_in_room(&RoomId::new(room))
        .iter()
        .map(|i| i.name.clone())
        .collect()
}

#[test]
fn test_pickup_quoted_name_moves_item_into_inventory() {
    let (mut game, ada, ben) = new_game();
    let mut script = Script::default();
    script.say(ada, "I'll grab it.\n> pickup \"Large Sword\"");

    let report = game.run_rounds(&mut script, 1).unwrap();

    let ada_report = report.agent("Ada").unwrap();
    assert_eq!(ada_report.inventory, vec!["Large Sword"]);
    assert_eq!(ada_report.capacity_used, 4);
    assert_eq!(ada_report.capacity_available, 6);
    assert_eq!(ada_report.action_points, 2);
    assert_eq!(room_items(&game, "square"), vec!["Giant Anvil"]);
    assert!(script.last_prompt(ben).contains("Ada picks up the Large Sword."));
}

#[test]
fn test_size_tier_refusal_keeps_item_and_warns_onlookers() {
    let (mut game, ada, ben) = new_game();
    let mut script = Script::default();
    script.say(ada, "> pickup \"Giant Anvil\"");

    let report = game.run_rounds(&mut script, 1).unwrap();

    assert!(report.agent("Ada").unwrap().inventory.is_empty());
    assert_eq!(report.agent("Ada").unwrap().action_points, 3);
    assert_eq!(room_items(&game, "square").len(), 2);
    assert!(script
        .last_prompt(ben)
        .contains("Ada tries to lift the Giant Anvil but is too small."));

    let feedback = &report.agent("Ada").unwrap().undelivered;
    assert!(feedback
        .iter()
        .any(|e| e.message.contains("you are medium, it requires huge")));
}

#[test]
fn test_refused_effect_list_leaves_world_unchanged() {
    let (mut game, ada, _) = new_game();
    let log = {
        game.world_mut().agent_mut(ada).unwrap().reset_action_points(3);
        game.submit_text(ada, "> hoard \"Giant Anvil\"").unwrap()
    };

    assert!(matches!(log[0], Resolution::Rejected { .. }));
    let ada_now = game.world().agent(ada).unwrap();
    assert!(!ada_now.has_tag("greedy"));
    assert_eq!(ada_now.action_points, 3);
}

#[test]
fn test_self_scoped_event_reaches_only_its_actor() {
    let (mut game, ada, ben) = new_game();
    let mut script = Script::default();
    script.say(ada, "> ponder");

    game.run_rounds(&mut script, 1).unwrap();

    assert!(!script.last_prompt(ben).contains("Ada ponders."));
    let queued = game.distributor().queued(ada);
    assert!(queued.iter().any(|e| e.message == "Ada ponders."));
}

#[test]
fn test_longest_action_name_wins() {
    let (mut game, ada, _) = new_game();
    game.world_mut().agent_mut(ada).unwrap().reset_action_points(3);

    let log = game.submit_text(ada, "> look at Ben\n> look").unwrap();

    assert_eq!(
        log,
        vec![
            Resolution::Applied {
                action: "look_at".to_string(),
                cost: 0
            },
            Resolution::Applied {
                action: "look".to_string(),
                cost: 0
            },
        ]
    );
    let messages: Vec<&str> = game
        .distributor()
        .queued(ada)
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(messages, vec!["You study Ben.", "You look around."]);
}

#[test]
fn test_ap_exhaustion_skips_remaining_commands() {
    let (mut game, ada, _) = new_game();
    let mut script = Script::default();
    script.say(ada, "> go north\n> go south\n> go north\n> go south\n> look");

    game.run_rounds(&mut script, 1).unwrap();

    let ada_now = game.world().agent(ada).unwrap();
    assert_eq!(ada_now.location, RoomId::new("hall"));
    assert_eq!(ada_now.action_points, 0);
    let skipped = game
        .distributor()
        .queued(ada)
        .iter()
        .filter(|e| e.message.starts_with("Not enough action points"))
        .count();
    assert_eq!(skipped, 2);
}

#[test]
fn test_mayor_motive_through_play() {
    let (mut game, ada, _) = new_game();
    game.bind_motive(ada, "find_mayor").unwrap();
    assert!(game.bind_motive(ada, "find_mayor").is_err());

    let mut script = Script::default();
    script.say(ada, "> search\n> go north\n> expose");
    game.run_rounds(&mut script, 1).unwrap();
    // Nobody hides in the square, so there was nothing to expose.
    assert_eq!(game.snapshot(ada).unwrap().final_status, FinalStatus::NotAchieved);

    script.say(ada, "> search\n> expose");
    game.run_rounds(&mut script, 1).unwrap();
    assert_eq!(game.snapshot(ada).unwrap().final_status, FinalStatus::Win);

    script.say(ada, "> falter");
    game.run_rounds(&mut script, 1).unwrap();
    let prompt = script.last_prompt(ada);
    assert!(prompt.contains("You have found the mayor."));
    assert!(prompt.contains("The cult stands exposed."));
    let snapshot = game.snapshot(ada).unwrap();
    assert!(snapshot.success && snapshot.failure);
    assert_eq!(snapshot.final_status, FinalStatus::Fail);

    script.say(ada, "> rally\n> read ledger\n> read letter\n> read ledger");
    let report = game.run_rounds(&mut script, 1).unwrap();
    assert_eq!(report.rounds_played, 4);
    assert_eq!(report.agent("Ada").unwrap().evidence, 2);
    assert_eq!(
        report.agent("Ada").unwrap().motive.as_ref().unwrap().final_status,
        FinalStatus::Win
    );
    // Progress narration is not repeated.
    assert!(!script.last_prompt(ada).contains("You have found the mayor."));
}

#[test]
fn test_malformed_catalogs_are_rejected_at_load() {
    let implicit_combinator = r#"
        [[actions]]
        id = "sneak"
        requirements = [
            { kind = "has_tag", tag = "quiet" },
            { kind = "has_tag", tag = "nimble" },
        ]
    "#;
    assert!(matches!(
        Catalog::from_toml_str(implicit_combinator),
        Err(RulesError::MissingCombinator { .. })
    ));

    let undeclared_parameter = r#"
        [[actions]]
        id = "pickup"
        requirements = { kind = "object_in_room", parameter = "object_name" }
    "#;
    assert!(matches!(
        Catalog::from_toml_str(undeclared_parameter),
        Err(RulesError::UnknownParameter { .. })
    ));

    let duplicate = r#"
        [[actions]]
        id = "wait"
        [[actions]]
        id = "wait"
    "#;
    assert!(matches!(
        Catalog::from_toml_str(duplicate),
        Err(RulesError::DuplicateId { .. })
    ));
}
