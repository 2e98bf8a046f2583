use motor_control::MotorError;
use thiserror::Error;

pub type Result<T, E = RobotError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RobotError {
    #[error(transparent)]
    Motor(#[from] MotorError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("hardware backend not available: {0}")]
    UnsupportedBackend(&'static str),
}
