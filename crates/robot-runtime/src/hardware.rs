#[cfg(feature = "mock")]
use motor_control::{MockServo, SimulatedWheel};
use motor_control::{ActuatorRegistry, DcMotor, ServoMotor};
use std::sync::Arc;

#[cfg(feature = "mock")]
use crate::MotionConfig;
use crate::{Result, RobotConfig};

/// Wheel speed of the simulated backend at full duty cycle
#[cfg(feature = "mock")]
pub const MOCK_ROTATIONS_PER_SECOND: f64 = 2.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HardwareBackend {
    Mock,
    Gpio,
}

/// The rover's actuators: two encoder-tracked wheels and the steering servo
pub struct RobotHardware {
    pub left: Arc<DcMotor>,
    pub right: Arc<DcMotor>,
    pub servo: Arc<ServoMotor>,
}

impl RobotHardware {
    pub fn new(left: DcMotor, right: DcMotor, servo: ServoMotor) -> Self {
        Self {
            left: Arc::new(left),
            right: Arc::new(right),
            servo: Arc::new(servo),
        }
    }

    pub fn registry(&self) -> Result<ActuatorRegistry> {
        let mut registry = ActuatorRegistry::new();
        registry.register(self.left.clone())?;
        registry.register(self.right.clone())?;
        registry.register(self.servo.clone())?;
        Ok(registry)
    }
}

pub fn build_hardware(backend: HardwareBackend, config: &RobotConfig) -> Result<RobotHardware> {
    match backend {
        HardwareBackend::Mock => {
            #[cfg(feature = "mock")]
            {
                Ok(mock_hardware(&config.motion).0)
            }
            #[cfg(not(feature = "mock"))]
            {
                let _ = config;
                Err(crate::RobotError::UnsupportedBackend("mock feature not enabled"))
            }
        }
        HardwareBackend::Gpio => {
            #[cfg(feature = "gpio")]
            {
                gpio_hardware(config)
            }
            #[cfg(not(feature = "gpio"))]
            {
                let _ = config;
                Err(crate::RobotError::UnsupportedBackend("gpio feature not enabled"))
            }
        }
    }
}

/// Handles onto the simulated outputs behind a mock [`RobotHardware`]
#[cfg(feature = "mock")]
#[derive(Clone)]
pub struct MockRig {
    pub left: SimulatedWheel,
    pub right: SimulatedWheel,
    pub servo: MockServo,
}

#[cfg(feature = "mock")]
pub fn mock_hardware(motion: &MotionConfig) -> (RobotHardware, MockRig) {
    let pulses_per_second = f64::from(motion.signals_per_rotation) * MOCK_ROTATIONS_PER_SECOND;
    let rig = MockRig {
        left: SimulatedWheel::new(pulses_per_second),
        right: SimulatedWheel::new(pulses_per_second),
        servo: MockServo::new(),
    };
    let wheel = |name: &str, sim: &SimulatedWheel| {
        DcMotor::new(
            name,
            Box::new(sim.clone()),
            motor_control::Encoder::new(Arc::new(sim.clone()), motion.geometry()),
            motion.motor_settings(),
        )
    };
    let hardware = RobotHardware::new(
        wheel("left", &rig.left),
        wheel("right", &rig.right),
        ServoMotor::new("steering", Box::new(rig.servo.clone())),
    );
    (hardware, rig)
}

#[cfg(feature = "gpio")]
fn gpio_hardware(config: &RobotConfig) -> Result<RobotHardware> {
    use motor_control::{open_gpio, DcMotorPins, Encoder, GpioEncoder, GpioHBridge, GpioServo};

    let gpio = open_gpio()?;
    let motion = &config.motion;
    let wheel = |name: &str, pins: &DcMotorPins| -> Result<DcMotor> {
        Ok(DcMotor::new(
            name,
            Box::new(GpioHBridge::open(&gpio, pins)?),
            Encoder::new(Arc::new(GpioEncoder::open(&gpio, pins)?), motion.geometry()),
            motion.motor_settings(),
        ))
    };
    Ok(RobotHardware::new(
        wheel("left", &config.left_motor)?,
        wheel("right", &config.right_motor)?,
        ServoMotor::new("steering", Box::new(GpioServo::open(&gpio, &config.servo)?)),
    ))
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_all_actuators() {
        let (hardware, _rig) = mock_hardware(&MotionConfig::default());
        let registry = hardware.registry().unwrap();
        assert_eq!(registry.names(), vec!["left", "right", "steering"]);
        assert!(!registry.any_running());
    }

    #[test]
    fn test_backend_selection() {
        let config = RobotConfig::default();
        assert!(build_hardware(HardwareBackend::Mock, &config).is_ok());

        #[cfg(not(feature = "gpio"))]
        assert!(matches!(
            build_hardware(HardwareBackend::Gpio, &config),
            Err(crate::RobotError::UnsupportedBackend(_))
        ));
    }
}
