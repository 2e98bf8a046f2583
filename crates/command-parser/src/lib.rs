//! Command Parser for Rover Voice Commands
//!
//! This crate turns loosely structured spoken sentences ("to meter frem og
//! tilbage") into an ordered list of discrete rover commands. Parsing is a
//! single left-to-right keyword scan; each command word may pick up a
//! distance word and a number word from the two tokens on either side.

mod command;
mod error;
mod keywords;
mod parser;

pub use command::{
    Command, CommandKind, SourceWords, DEFAULT_DISTANCE_SCALE, DEFAULT_MULTIPLIER,
};
pub use error::{ParseError, Result};
pub use keywords::KeywordTables;
pub use parser::{search_modifier, CommandParser, SearchDirection, MODIFIER_WINDOW};

/// Initialize the command parser system
pub fn init() {
    tracing::info!("Initializing command parser");
    // Build the keyword tables eagerly
    KeywordTables::builtin();
}

/// Parse text with the built-in vocabulary
pub fn parse_command(text: &str) -> Vec<Command> {
    CommandParser::new().parse(text)
}
