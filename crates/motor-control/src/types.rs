use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform pin number
pub type PinId = u8;

/// Pins wired to one wheel: H-bridge direction and speed outputs plus the
/// two encoder channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcMotorPins {
    pub forward: PinId,
    pub backward: PinId,
    pub encoder_a: PinId,
    pub encoder_b: PinId,
    pub speed: PinId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoPins {
    pub signal: PinId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// Wheel and encoder geometry used to turn pulses into meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelGeometry {
    pub circumference_m: f64,
    pub signals_per_rotation: u32,
}

impl WheelGeometry {
    pub fn distance_per_pulse(&self) -> f64 {
        self.circumference_m / f64::from(self.signals_per_rotation.max(1))
    }
}

/// Drive parameters for one DC motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSettings {
    /// Output duty cycle while moving (0.0..=1.0)
    pub speed: f32,
    /// How often the distance watcher samples the encoder
    pub poll_interval: Duration,
    /// Longest a single motion may take before it is abandoned
    pub timeout: Duration,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            speed: 0.5,
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// How a motion ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionOutcome {
    /// The target distance was reached and the watcher stopped the motor
    Reached { travelled_m: f64 },
    /// The motor was stopped or restarted before the target was reached
    Cancelled,
}

impl MotionOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, MotionOutcome::Reached { .. })
    }
}
