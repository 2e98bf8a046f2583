//! Keyword scanner turning free text into an ordered list of commands

use crate::{Command, CommandKind, KeywordTables};
use tracing::debug;

/// How many tokens on each side of a command word may carry its modifiers
pub const MODIFIER_WINDOW: usize = 2;

/// Side of the command word to search for a modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Backward,
    Forward,
}

/// Find the closest modifier next to `tokens[index]`.
///
/// Looks at most [`MODIFIER_WINDOW`] tokens away in `direction`. Command
/// words are skipped but still count towards the window. Returns the
/// position of the matching token and the value it maps to.
pub fn search_modifier<T>(
    tokens: &[String],
    index: usize,
    direction: SearchDirection,
    is_command: impl Fn(&str) -> bool,
    lookup: impl Fn(&str) -> Option<T>,
) -> Option<(usize, T)> {
    for step in 1..=MODIFIER_WINDOW {
        let position = match direction {
            SearchDirection::Backward => index.checked_sub(step),
            SearchDirection::Forward => Some(index + step).filter(|p| *p < tokens.len()),
        };
        let Some(position) = position else {
            continue;
        };

        let word = tokens[position].as_str();
        if is_command(word) {
            continue;
        }
        if let Some(value) = lookup(word) {
            return Some((position, value));
        }
    }
    None
}

/// Keyword-based command parser
#[derive(Debug, Clone, Copy)]
pub struct CommandParser {
    tables: &'static KeywordTables,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Create a parser over the built-in vocabulary
    pub fn new() -> Self {
        Self {
            tables: KeywordTables::builtin(),
        }
    }

    pub fn tables(&self) -> &'static KeywordTables {
        self.tables
    }

    /// Parse text into commands, in the order their command words appear.
    ///
    /// Unknown words are dropped. Modifiers in front of a command word win
    /// over modifiers behind it, and a claimed modifier is removed so no
    /// other command can use it.
    pub fn parse(&self, text: &str) -> Vec<Command> {
        debug!("Raw command text: {}", text);

        let mut tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let mut commands = Vec::new();
        let mut index = 0;

        while index < tokens.len() {
            let Some(kind) = self.tables.command(&tokens[index]) else {
                index += 1;
                continue;
            };

            if kind == CommandKind::Stop {
                commands.push(Command::stop(tokens.remove(index)));
                continue;
            }

            let distance = self.take_modifier(&mut tokens, &mut index, |w| self.tables.distance(w));
            let number = self.take_modifier(&mut tokens, &mut index, |w| self.tables.number(w));

            let mut command = Command::new(kind, tokens.remove(index));
            if let Some((word, scale)) = distance {
                command = command.with_distance(word, scale);
            }
            if let Some((word, multiplier)) = number {
                command = command.with_multiplier(word, multiplier);
            }
            commands.push(command);
        }

        debug!("Parsed {} command(s): {:?}", commands.len(), commands);
        commands
    }

    /// Claim a modifier for the command word at `index`, searching backward
    /// first. A backward claim removes a token in front of the command word,
    /// so `index` is moved back by one to keep pointing at it.
    fn take_modifier<T>(
        &self,
        tokens: &mut Vec<String>,
        index: &mut usize,
        lookup: impl Fn(&str) -> Option<T>,
    ) -> Option<(String, T)> {
        let is_command = |w: &str| self.tables.is_command(w);

        if let Some((position, value)) = search_modifier(
            tokens.as_slice(),
            *index,
            SearchDirection::Backward,
            is_command,
            &lookup,
        ) {
            *index -= 1;
            return Some((tokens.remove(position), value));
        }

        search_modifier(
            tokens.as_slice(),
            *index,
            SearchDirection::Forward,
            is_command,
            &lookup,
        )
        .map(|(position, value)| (tokens.remove(position), value))
    }
}
