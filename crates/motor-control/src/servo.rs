use crate::{Actuator, MotorError, Result, ServoOutput};
use std::sync::Mutex;
use tracing::debug;

/// Largest steering deflection either side of center, in degrees
pub const SERVO_RANGE_DEGREES: f64 = 90.0;

/// Map a steering angle to a servo value in `-1.0..=1.0`.
///
/// Angles outside ±[`SERVO_RANGE_DEGREES`] are rejected, not clamped.
pub fn degrees_to_value(degrees: f64) -> Result<f64> {
    if !(-SERVO_RANGE_DEGREES..=SERVO_RANGE_DEGREES).contains(&degrees) {
        return Err(MotorError::AngleOutOfRange(degrees));
    }
    Ok(degrees / SERVO_RANGE_DEGREES)
}

struct ServoState {
    output: Box<dyn ServoOutput>,
    value: Option<f64>,
}

/// Steering servo.
///
/// Hobby servos give no position feedback, so [`Actuator::is_running`] is
/// always `false`: a commanded position is assumed to be reached at once.
pub struct ServoMotor {
    name: String,
    state: Mutex<ServoState>,
}

impl ServoMotor {
    pub fn new(name: impl Into<String>, output: Box<dyn ServoOutput>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ServoState {
                output,
                value: None,
            }),
        }
    }

    /// Point the servo at `degrees` (negative is left).
    pub fn turn(&self, degrees: f64) -> Result<()> {
        let value = degrees_to_value(degrees)?;
        self.set(value)?;
        debug!("{}: turned to {:.1} degrees", self.name, degrees);
        Ok(())
    }

    pub fn center(&self) -> Result<()> {
        self.set(0.0)?;
        debug!("{}: centered", self.name);
        Ok(())
    }

    pub fn is_centered(&self) -> bool {
        self.value() == Some(0.0)
    }

    /// Last commanded value, `None` while detached
    pub fn value(&self) -> Option<f64> {
        self.state.lock().ok().and_then(|state| state.value)
    }

    fn set(&self, value: f64) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| MotorError::Poisoned("servo output"))?;
        state.output.set_value(value)?;
        state.value = Some(value);
        Ok(())
    }
}

impl Actuator for ServoMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| MotorError::Poisoned("servo output"))?;
        state.value = None;
        state.output.detach()
    }

    fn is_running(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_to_value() {
        assert_eq!(degrees_to_value(0.0), Ok(0.0));
        assert_eq!(degrees_to_value(90.0), Ok(1.0));
        assert_eq!(degrees_to_value(-45.0), Ok(-0.5));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(degrees_to_value(90.5), Err(MotorError::AngleOutOfRange(90.5)));
        assert_eq!(degrees_to_value(-180.0), Err(MotorError::AngleOutOfRange(-180.0)));
        assert!(degrees_to_value(f64::NAN).is_err());
    }

    #[cfg(feature = "mock")]
    #[test]
    fn test_turn_center_and_stop() {
        use crate::MockServo;

        let output = MockServo::new();
        let servo = ServoMotor::new("steering", Box::new(output.clone()));
        assert!(!servo.is_centered());

        servo.turn(45.0).unwrap();
        assert_eq!(output.value(), Some(0.5));
        assert!(!servo.is_centered());
        assert!(!servo.is_running());

        assert!(servo.turn(120.0).is_err());
        assert_eq!(servo.value(), Some(0.5));

        servo.center().unwrap();
        assert!(servo.is_centered());

        servo.stop().unwrap();
        assert_eq!(servo.value(), None);
        assert!(!output.is_attached());
        assert_eq!(output.history(), vec![0.5, 0.0]);
    }
}
