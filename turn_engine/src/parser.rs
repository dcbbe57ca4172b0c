//! Command parsing: turning an agent's free text into action calls.
//!
//! Only lines that start with the command marker are considered. Each such
//! line yields exactly one entry in the output, either a command or a
//! [`ParseError`] carrying the raw line.

use std::collections::BTreeMap;
use tracing::warn;

use game_rules::{ActionCategory, ActionDefinition, Params};

/// Words that separate the parameters of multi-parameter actions.
pub const PREPOSITIONS: &[&str] = &["on", "to", "with", "at"];

const QUOTES: &[char] = &['"', '\''];

/// A matched action with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall {
    pub action_id: String,
    /// The word the agent typed for the action: an alias or the action name.
    pub verb: String,
    pub params: Params,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(ActionCall),
    /// Explicit pass or quit.
    EndTurn,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no action matches `{line}`")]
    UnknownAction { line: String },

    #[error("`{action}` needs a value for `{parameter}`")]
    MissingParameter {
        line: String,
        action: String,
        parameter: String,
    },

    #[error("could not read `{line}`; the format is: {expected}")]
    FormatHint { line: String, expected: String },
}

impl ParseError {
    /// The raw command line that failed.
    pub fn line(&self) -> &str {
        match self {
            ParseError::UnknownAction { line }
            | ParseError::MissingParameter { line, .. }
            | ParseError::FormatHint { line, .. } => line,
        }
    }
}

pub type ParsedLine = Result<Command, ParseError>;

#[derive(Debug, Clone)]
pub struct CommandParser {
    marker: String,
    pass_commands: Vec<String>,
}

impl CommandParser {
    pub fn new(marker: impl Into<String>, pass_commands: Vec<String>) -> Self {
        Self {
            marker: marker.into(),
            pass_commands,
        }
    }

    /// Parse every marker line of `text`, in written order.
    ///
    /// `aliases` maps context verbs (from nearby objects) to canonical
    /// action names and is consulted before the action names themselves.
    pub fn parse(
        &self,
        text: &str,
        actions: &[&ActionDefinition],
        aliases: &BTreeMap<String, String>,
    ) -> Vec<ParsedLine> {
        text.lines()
            .map(str::trim)
            .filter_map(|line| line.strip_prefix(self.marker.as_str()).map(|body| (line, body.trim())))
            .map(|(line, body)| {
                let parsed = self.parse_body(line, body, actions, aliases);
                if let Err(err) = &parsed {
                    warn!(error = %err, "unparseable command");
                }
                parsed
            })
            .collect()
    }

    fn parse_body(
        &self,
        line: &str,
        body: &str,
        actions: &[&ActionDefinition],
        aliases: &BTreeMap<String, String>,
    ) -> ParsedLine {
        let unknown = || ParseError::UnknownAction {
            line: line.to_string(),
        };

        let first_word = body.split_whitespace().next().ok_or_else(unknown)?;
        if self.pass_commands.iter().any(|p| p.eq_ignore_ascii_case(first_word)) {
            return Ok(Command::EndTurn);
        }

        // An alias is rewritten to its canonical name, then matched like any other line.
        let (verb, text) = match longest_prefix(body, aliases.keys().map(String::as_str)) {
            Some(alias) => {
                let canonical = &aliases[alias];
                (
                    body[..alias.len()].to_string(),
                    format!("{} {}", canonical, &body[alias.len()..]),
                )
            }
            None => (String::new(), body.to_string()),
        };

        let action = longest_prefix(&text, actions.iter().map(|a| a.name.as_str()))
            .and_then(|name| actions.iter().find(|a| a.name == name))
            .ok_or_else(unknown)?;
        let remainder = text[action.name.len()..].trim();
        let verb = if verb.is_empty() {
            text[..action.name.len()].to_string()
        } else {
            verb
        };

        let params = if action.category == ActionCategory::AddressedSpeech && action.parameters.len() == 2 {
            self.addressed_speech(line, action, remainder)?
        } else {
            parameters(line, action, remainder)?
        };

        Ok(Command::Action(ActionCall {
            action_id: action.id.clone(),
            verb,
            params,
            line: line.to_string(),
        }))
    }

    /// `tell <target> "<message>"`.
    fn addressed_speech(&self, line: &str, action: &ActionDefinition, remainder: &str) -> Result<Params, ParseError> {
        let target_name = &action.parameters[0].name;
        let message_name = &action.parameters[1].name;
        let hint = || ParseError::FormatHint {
            line: line.to_string(),
            expected: format!(
                "{} {} <{}> \"<{}>\"",
                self.marker, action.name, target_name, message_name
            ),
        };

        let (target, message) = match leading_quoted(remainder) {
            // `"<message>" to <target>` is the one shape we refuse to guess at.
            Some((_, rest)) if addresses_with_to(rest) => return Err(hint()),
            Some((quoted, rest)) => (quoted, strip_quotes(rest)),
            None if remainder.starts_with(QUOTES) => return Err(hint()),
            None => match remainder.find(QUOTES) {
                Some(at) => (remainder[..at].trim(), strip_quotes(&remainder[at..])),
                None => match remainder.split_once(char::is_whitespace) {
                    Some((target, message)) => (target, message.trim()),
                    None => (remainder, ""),
                },
            },
        };

        let missing = |parameter: &str| ParseError::MissingParameter {
            line: line.to_string(),
            action: action.name.clone(),
            parameter: parameter.to_string(),
        };
        if target.is_empty() {
            return Err(missing(target_name));
        }
        if message.is_empty() {
            return Err(missing(message_name));
        }

        let mut params = Params::new();
        params.insert(target_name.clone(), strip_quotes(target).to_string());
        params.insert(message_name.clone(), message.to_string());
        Ok(params)
    }
}

fn parameters(line: &str, action: &ActionDefinition, remainder: &str) -> Result<Params, ParseError> {
    let names: Vec<&str> = action.parameter_names().collect();
    let pieces: Vec<String> = match names.len() {
        0 => return Ok(Params::new()),
        1 => vec![remainder.to_string()],
        n => split_on_prepositions(remainder, n),
    };

    let mut params = Params::new();
    for (i, name) in names.iter().enumerate() {
        let value = pieces.get(i).map(|p| strip_quotes(p)).unwrap_or("");
        if value.is_empty() {
            return Err(ParseError::MissingParameter {
                line: line.to_string(),
                action: action.name.clone(),
                parameter: name.to_string(),
            });
        }
        params.insert(name.to_string(), value.to_string());
    }
    Ok(params)
}

/// The longest candidate that prefixes `text` case-insensitively and ends on
/// a word boundary.
fn longest_prefix<'c>(text: &str, candidates: impl Iterator<Item = &'c str>) -> Option<&'c str> {
    candidates
        .filter(|c| !c.is_empty() && starts_with_word(text, c))
        .max_by_key(|c| c.len())
}

fn starts_with_word(text: &str, word: &str) -> bool {
    let Some(head) = text.get(..word.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(word)
        && text[word.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || QUOTES.contains(&c))
}

/// Remove one layer of surrounding quotes. An unmatched leading or trailing
/// quote is dropped as well.
pub fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    let mut chars = text.chars();
    let (first, last) = (chars.next(), chars.next_back());
    match (first, last) {
        (Some(a), Some(b)) if a == b && QUOTES.contains(&a) => text[1..text.len() - 1].trim(),
        (Some(a), _) if QUOTES.contains(&a) => text[1..].trim(),
        (_, Some(b)) if QUOTES.contains(&b) => text[..text.len() - 1].trim(),
        _ => text,
    }
}

/// A leading quoted span and whatever follows its closing quote.
fn leading_quoted(text: &str) -> Option<(&str, &str)> {
    let quote = text.chars().next().filter(|c| QUOTES.contains(c))?;
    let end = text[1..].find(quote)? + 1;
    Some((text[1..end].trim(), text[end + 1..].trim()))
}

fn addresses_with_to(rest: &str) -> bool {
    let mut words = rest.split_whitespace();
    words.next().is_some_and(|w| w.eq_ignore_ascii_case("to")) && words.next().is_some()
}

/// Split `text` into at most `pieces` parts at prepositions that stand
/// outside quoted spans.
fn split_on_prepositions(text: &str, pieces: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut at_word_start = true;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match quote {
            Some(q) => {
                let closes = c == q && chars.peek().map_or(true, |(_, next)| next.is_whitespace());
                if closes {
                    quote = None;
                }
            }
            None if at_word_start && QUOTES.contains(&c) => quote = Some(c),
            None if at_word_start && !c.is_whitespace() && out.len() + 1 < pieces => {
                let end = text[pos..].find(char::is_whitespace).map_or(text.len(), |n| pos + n);
                let word = &text[pos..end];
                if pos > start && PREPOSITIONS.iter().any(|p| word.eq_ignore_ascii_case(p)) {
                    out.push(text[start..pos].trim().to_string());
                    start = end;
                    while chars.peek().is_some_and(|(i, _)| *i < end) {
                        chars.next();
                    }
                    at_word_start = false;
                    continue;
                }
            }
            None => {}
        }
        at_word_start = c.is_whitespace();
    }
    out.push(text[start..].trim().to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<ActionDefinition> {
        vec![
            ActionDefinition::new("look", "look"),
            ActionDefinition::new("look_closely", "look closely").with_parameter("object_name"),
            ActionDefinition::new("pickup", "pickup").with_parameter("object_name"),
            ActionDefinition::new("use", "use")
                .with_parameter("object_name")
                .with_parameter("target"),
            ActionDefinition::new("tell", "tell")
                .with_parameter("target")
                .with_parameter("message")
                .with_category(ActionCategory::AddressedSpeech),
        ]
    }

    fn parse_with(text: &str, aliases: &BTreeMap<String, String>) -> Vec<ParsedLine> {
        let actions = catalog();
        let refs: Vec<&ActionDefinition> = actions.iter().collect();
        CommandParser::new(">", vec!["pass".to_string(), "quit".to_string()]).parse(text, &refs, aliases)
    }

    fn parse(text: &str) -> Vec<ParsedLine> {
        parse_with(text, &BTreeMap::new())
    }

    fn call(parsed: &ParsedLine) -> &ActionCall {
        match parsed {
            Ok(Command::Action(call)) => call,
            other => panic!("expected an action, got {:?}", other),
        }
    }

    #[test]
    fn test_pickup_quoted_name() {
        let parsed = parse("I should grab it.\n> pickup \"Large Sword\"");
        assert_eq!(parsed.len(), 1);
        let call = call(&parsed[0]);
        assert_eq!(call.action_id, "pickup");
        assert_eq!(call.params["object_name"], "Large Sword");
    }

    #[test]
    fn test_longest_match_wins() {
        let parsed = parse("> look closely\n> LOOK closely \"the mural\"\n> look");
        assert_eq!(parsed.len(), 3);
        // A bare "look closely" is the longer action missing its parameter.
        assert!(matches!(
            &parsed[0],
            Err(ParseError::MissingParameter { parameter, .. }) if parameter == "object_name"
        ));
        assert_eq!(call(&parsed[1]).action_id, "look_closely");
        assert_eq!(call(&parsed[1]).params["object_name"], "the mural");
        assert_eq!(call(&parsed[2]).action_id, "look");
    }

    #[test]
    fn test_word_boundary() {
        let parsed = parse("> lookout");
        assert!(matches!(&parsed[0], Err(ParseError::UnknownAction { .. })));
    }

    #[test]
    fn test_zero_parameters_ignore_trailing_text() {
        let parsed = parse("> look around carefully");
        let call = call(&parsed[0]);
        assert_eq!(call.action_id, "look");
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_unmatched_quotes_tolerated() {
        assert_eq!(call(&parse("> pickup Rusty Key\"")[0]).params["object_name"], "Rusty Key");
        assert_eq!(call(&parse("> pickup 'Rusty Key")[0]).params["object_name"], "Rusty Key");
        assert_eq!(call(&parse("> pickup   lamp  ")[0]).params["object_name"], "lamp");
    }

    #[test]
    fn test_prepositions_split_outside_quotes() {
        let parsed = parse("> use \"bread with butter\" on Old Tom");
        let quoted = call(&parsed[0]);
        assert_eq!(quoted.params["object_name"], "bread with butter");
        assert_eq!(quoted.params["target"], "Old Tom");

        let parsed = parse("> use key with door");
        assert_eq!(call(&parsed[0]).params["target"], "door");

        let parsed = parse("> use key");
        assert!(matches!(&parsed[0], Err(ParseError::MissingParameter { parameter, .. }) if parameter == "target"));
    }

    #[test]
    fn test_addressed_speech() {
        let parsed = parse("> tell Old Tom \"meet me at the docks\"");
        let call = call(&parsed[0]);
        assert_eq!(call.params["target"], "Old Tom");
        assert_eq!(call.params["message"], "meet me at the docks");

        let parsed = parse("> tell \"meet me at the docks\" to Tom");
        match &parsed[0] {
            Err(ParseError::FormatHint { expected, .. }) => {
                assert_eq!(expected, "> tell <target> \"<message>\"");
            }
            other => panic!("expected a format hint, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_target_is_accepted() {
        let parsed = parse("> tell \"Old Tom\" \"hello there\"");
        let call = call(&parsed[0]);
        assert_eq!(call.params["target"], "Old Tom");
        assert_eq!(call.params["message"], "hello there");

        let parsed = parse("> tell \"Old Tom\" to the docks at dawn");
        assert!(matches!(parsed[0], Err(ParseError::FormatHint { .. })));

        let parsed = parse("> tell \"Old Tom\"");
        assert!(matches!(parsed[0], Err(ParseError::MissingParameter { .. })));
    }

    #[test]
    fn test_aliases_resolve_first() {
        let mut aliases = BTreeMap::new();
        aliases.insert("pull".to_string(), "use".to_string());
        aliases.insert("grab".to_string(), "pickup".to_string());

        let parsed = parse_with("> pull lever on wall\n> grab lamp", &aliases);
        let first = call(&parsed[0]);
        assert_eq!(first.action_id, "use");
        assert_eq!(first.verb, "pull");
        assert_eq!(first.params["object_name"], "lever");
        assert_eq!(call(&parsed[1]).action_id, "pickup");
    }

    #[test]
    fn test_pass_and_unknown_lines_are_reported() {
        let parsed = parse("> dance wildly\n> pass\nnot a command");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_ref().unwrap_err().line(), "> dance wildly");
        assert_eq!(parsed[1], Ok(Command::EndTurn));
    }
}
