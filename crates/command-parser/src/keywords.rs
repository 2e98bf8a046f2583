//! Fixed keyword vocabulary

use crate::CommandKind;
use std::collections::HashMap;
use std::sync::OnceLock;

const COMMAND_WORDS: &[(&str, CommandKind)] = &[
    ("stop", CommandKind::Stop),
    ("frem", CommandKind::Forward),
    ("fremad", CommandKind::Forward),
    ("tilbage", CommandKind::Backward),
    ("baglæns", CommandKind::Backward),
    ("bagud", CommandKind::Backward),
    ("højre", CommandKind::TurnRight),
    ("venstre", CommandKind::TurnLeft),
    ("vend", CommandKind::Turn180),
    ("rundt", CommandKind::Turn180),
];

// Scales are in meters.
const DISTANCE_WORDS: &[(&str, f64)] = &[
    ("millimeter", 0.001),
    ("centimeter", 0.01),
    ("decimeter", 0.1),
    ("meter", 1.0),
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("en", 1),
    ("et", 1),
    ("1", 1),
    ("to", 2),
    ("2", 2),
    ("tre", 3),
    ("3", 3),
    ("fire", 4),
    ("4", 4),
    ("fem", 5),
    ("5", 5),
];

/// Word lookups for command kinds, distance units and repeat counts.
///
/// Lookups expect lower-cased words.
#[derive(Debug, Clone)]
pub struct KeywordTables {
    commands: HashMap<&'static str, CommandKind>,
    distances: HashMap<&'static str, f64>,
    numbers: HashMap<&'static str, u32>,
}

impl KeywordTables {
    /// The built-in vocabulary, built on first use and shared afterwards.
    pub fn builtin() -> &'static KeywordTables {
        static TABLES: OnceLock<KeywordTables> = OnceLock::new();
        TABLES.get_or_init(|| {
            let tables = KeywordTables {
                commands: COMMAND_WORDS.iter().copied().collect(),
                distances: DISTANCE_WORDS.iter().copied().collect(),
                numbers: NUMBER_WORDS.iter().copied().collect(),
            };
            tracing::debug!(
                commands = tables.commands.len(),
                distances = tables.distances.len(),
                numbers = tables.numbers.len(),
                "Keyword tables loaded"
            );
            tables
        })
    }

    pub fn command(&self, word: &str) -> Option<CommandKind> {
        self.commands.get(word).copied()
    }

    pub fn is_command(&self, word: &str) -> bool {
        self.commands.contains_key(word)
    }

    pub fn distance(&self, word: &str) -> Option<f64> {
        self.distances.get(word).copied()
    }

    pub fn number(&self, word: &str) -> Option<u32> {
        self.numbers.get(word).copied()
    }
}
