//! motor-control: closed-loop wheel motors and steering for the rover
//!
//! This crate provides the actuator layer: DC motors that drive until their
//! wheel encoder reports a requested distance, a steering servo, and a
//! registry used for "stop everything" handling. Hardware sits behind small
//! traits with feature-gated backends. The default build enables a `mock`
//! backend so that binaries can compile on any host without GPIO access.

mod types;
pub use types::{
    DcMotorPins, Direction, MotionOutcome, MotorSettings, PinId, ServoPins, WheelGeometry,
};

mod error;
pub use error::{MotorError, Result};

mod traits;
pub use traits::{Actuator, HBridge, PulseCounter, ServoOutput};

mod encoder;
pub use encoder::Encoder;

mod dc_motor;
pub use dc_motor::{DcMotor, Motion};

mod servo;
pub use servo::{degrees_to_value, ServoMotor, SERVO_RANGE_DEGREES};

mod registry;
pub use registry::ActuatorRegistry;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockServo, SimulatedWheel};

#[cfg(feature = "gpio")]
mod gpio;

#[cfg(feature = "gpio")]
pub use gpio::{open_gpio, GpioEncoder, GpioHBridge, GpioServo};

/// Initialize the actuator layer
pub fn init() {
    tracing::info!(
        "Initializing motor control (mock: {}, gpio: {})",
        cfg!(feature = "mock"),
        cfg!(feature = "gpio")
    );
}
