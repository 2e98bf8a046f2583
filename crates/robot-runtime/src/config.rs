//! Rover configuration: GPIO pin assignments and motion tuning, loaded from YAML.

use crate::{Result, RobotError};
use anyhow::Context;
use motor_control::{DcMotorPins, MotorSettings, ServoPins, WheelGeometry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub left_motor: DcMotorPins,
    pub right_motor: DcMotorPins,
    pub servo: ServoPins,
    pub motion: MotionConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            left_motor: DcMotorPins {
                forward: 17,
                backward: 27,
                encoder_a: 5,
                encoder_b: 6,
                speed: 12,
            },
            right_motor: DcMotorPins {
                forward: 23,
                backward: 24,
                encoder_a: 16,
                encoder_b: 26,
                speed: 13,
            },
            servo: ServoPins { signal: 18 },
            motion: MotionConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Reject values the motion layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let m = &self.motion;
        if !(0.0..=1.0).contains(&m.speed) {
            return Err(RobotError::Config(format!(
                "speed must be within 0.0..=1.0, got {}",
                m.speed
            )));
        }
        if !(0.0..=90.0).contains(&m.tilt_degrees) {
            return Err(RobotError::Config(format!(
                "tilt_degrees must be within 0..=90, got {}",
                m.tilt_degrees
            )));
        }
        if !positive(m.wheel_circumference_m) || !positive(m.turn_arc_m) {
            return Err(RobotError::Config(
                "wheel_circumference_m and turn_arc_m must be positive".to_string(),
            ));
        }
        if m.signals_per_rotation == 0 {
            return Err(RobotError::Config(
                "signals_per_rotation must be non-zero".to_string(),
            ));
        }
        if m.watcher_poll_ms == 0 || m.idle_poll_ms == 0 || m.motion_timeout_ms == 0 {
            return Err(RobotError::Config(
                "poll intervals and motion timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Motion tuning shared by both wheels and the steering servo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// PWM duty cycle for every drive and turn
    pub speed: f32,
    pub wheel_circumference_m: f64,
    pub signals_per_rotation: u32,
    /// Distance each wheel travels for a 90 degree turn
    pub turn_arc_m: f64,
    /// Servo deflection while turning
    pub tilt_degrees: f64,
    pub watcher_poll_ms: u64,
    pub motion_timeout_ms: u64,
    /// How often the dispatch loop re-checks an idle queue
    pub idle_poll_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 0.5,
            wheel_circumference_m: 0.21,
            signals_per_rotation: 40,
            turn_arc_m: 0.25,
            tilt_degrees: 45.0,
            watcher_poll_ms: 10,
            motion_timeout_ms: 30_000,
            idle_poll_ms: 1_000,
        }
    }
}

impl MotionConfig {
    pub fn geometry(&self) -> WheelGeometry {
        WheelGeometry {
            circumference_m: self.wheel_circumference_m,
            signals_per_rotation: self.signals_per_rotation,
        }
    }

    pub fn motor_settings(&self) -> MotorSettings {
        MotorSettings {
            speed: self.speed,
            poll_interval: Duration::from_millis(self.watcher_poll_ms),
            timeout: Duration::from_millis(self.motion_timeout_ms),
        }
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

/// Load and validate a YAML configuration file. Missing keys take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<RobotConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config: RobotConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config: {}", path.display()))?;
    Ok(config)
}
