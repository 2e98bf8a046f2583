//! robot-runtime: command queue and dispatch loop for the voice-driven rover
//!
//! Parsed command batches go into a FIFO queue. A single dispatch loop turns
//! each command into a drive or turn built from the actuators in
//! `motor-control`, and a Stop preempts whatever is in flight.

mod error;
pub use error::{Result, RobotError};

mod config;
pub use config::{load_config, MotionConfig, RobotConfig};

mod queue;

mod hardware;
pub use hardware::{build_hardware, HardwareBackend, RobotHardware};
#[cfg(feature = "mock")]
pub use hardware::{mock_hardware, MockRig, MOCK_ROTATIONS_PER_SECOND};

mod robot;
pub use robot::{DispatchOutcome, Robot, RobotHandle, RobotStatus};

/// Initialize the runtime
pub fn init() {
    tracing::info!("Initializing robot runtime");
    command_parser::init();
    motor_control::init();
}
