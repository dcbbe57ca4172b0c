//! # Turn Engine
//!
//! Drives a text world built from a `game_rules` catalog. Each round every
//! agent receives a prompt, answers with `>` command lines, and the engine
//! resolves them one at a time.
//!
//! ## Core Components
//!
//! - **parser**: Turns marker lines into action calls (longest match, quoting, prepositions)
//! - **distributor**: Scoped, deferred event delivery with per-agent queues
//! - **motive**: Win/fail status, progress narration and status prompts
//! - **prompt**: The agent-facing turn prompt
//! - **game**: The round/turn loop and the end-of-game report

pub mod config;
pub mod distributor;
pub mod error;
pub mod game;
pub mod motive;
pub mod parser;
pub mod prompt;

pub use config::EngineConfig;
pub use distributor::EventDistributor;
pub use error::EngineError;
pub use game::{AgentDriver, AgentReport, Game, GameReport, Resolution};
pub use motive::{FinalStatus, MotiveSnapshot, MotiveTracker};
pub use parser::{ActionCall, Command, CommandParser, ParseError};
pub use prompt::TurnPrompt;
