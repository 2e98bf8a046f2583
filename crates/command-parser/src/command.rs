//! Rover command definitions

use crate::ParseError;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Distance scale used when no distance word is attached to a command (meters)
pub const DEFAULT_DISTANCE_SCALE: f64 = 1.0;

/// Repeat count used when no number word is attached to a command
pub const DEFAULT_MULTIPLIER: u32 = 1;

/// Kinds of commands the rover understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Halt all motion and drop everything still queued
    Stop,
    /// Drive straight ahead
    Forward,
    /// Drive straight back
    Backward,
    /// Quarter turn clockwise
    TurnRight,
    /// Quarter turn counter-clockwise
    TurnLeft,
    /// Half turn
    Turn180,
}

impl CommandKind {
    /// Numeric code used when signaling a command kind between components.
    pub fn code(self) -> i8 {
        match self {
            CommandKind::Stop => 0,
            CommandKind::Forward => 1,
            CommandKind::Backward => -1,
            CommandKind::TurnRight => 2,
            CommandKind::TurnLeft => 3,
            CommandKind::Turn180 => 4,
        }
    }

    /// Commanded turn in degrees, positive is clockwise.
    ///
    /// Returns `None` for kinds that do not turn the rover.
    pub fn turn_angle(self) -> Option<f64> {
        match self {
            CommandKind::TurnRight => Some(90.0),
            CommandKind::TurnLeft => Some(-90.0),
            CommandKind::Turn180 => Some(180.0),
            CommandKind::Stop | CommandKind::Forward | CommandKind::Backward => None,
        }
    }
}

impl TryFrom<i8> for CommandKind {
    type Error = ParseError;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CommandKind::Stop),
            1 => Ok(CommandKind::Forward),
            -1 => Ok(CommandKind::Backward),
            2 => Ok(CommandKind::TurnRight),
            3 => Ok(CommandKind::TurnLeft),
            4 => Ok(CommandKind::Turn180),
            other => Err(ParseError::UnknownCode(other)),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Stop => "stop",
            CommandKind::Forward => "forward",
            CommandKind::Backward => "backward",
            CommandKind::TurnRight => "turn right",
            CommandKind::TurnLeft => "turn left",
            CommandKind::Turn180 => "turn 180",
        };
        f.write_str(name)
    }
}

/// Words a command was built from. Kept for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWords {
    pub command: String,
    pub distance: Option<String>,
    pub number: Option<String>,
}

/// One discrete instruction produced by the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    kind: CommandKind,
    distance_scale: f64,
    multiplier: u32,
    source: SourceWords,
}

impl Command {
    /// Create a command with default modifiers
    pub fn new(kind: CommandKind, word: impl Into<String>) -> Self {
        Self {
            kind,
            distance_scale: DEFAULT_DISTANCE_SCALE,
            multiplier: DEFAULT_MULTIPLIER,
            source: SourceWords {
                command: word.into(),
                distance: None,
                number: None,
            },
        }
    }

    /// Create a stop command
    pub fn stop(word: impl Into<String>) -> Self {
        Self::new(CommandKind::Stop, word)
    }

    /// Attach a distance word and its scale in meters
    pub fn with_distance(mut self, word: impl Into<String>, scale: f64) -> Self {
        self.distance_scale = scale;
        self.source.distance = Some(word.into());
        self
    }

    /// Attach a number word; a zero count is raised to one
    pub fn with_multiplier(mut self, word: impl Into<String>, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self.source.number = Some(word.into());
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn distance_scale(&self) -> f64 {
        self.distance_scale
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn source(&self) -> &SourceWords {
        &self.source
    }

    /// Travel distance in meters: `multiplier × distance_scale`.
    ///
    /// Turn and stop commands ignore this value.
    pub fn effective_distance(&self) -> f64 {
        f64::from(self.multiplier) * self.distance_scale
    }

    pub fn is_stop(&self) -> bool {
        self.kind == CommandKind::Stop
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CommandKind::Forward | CommandKind::Backward => write!(
                f,
                "{} {:.3}m ('{}')",
                self.kind,
                self.effective_distance(),
                self.source.command
            ),
            _ => write!(f, "{} ('{}')", self.kind, self.source.command),
        }
    }
}
