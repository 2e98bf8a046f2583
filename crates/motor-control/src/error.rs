use thiserror::Error;

pub type Result<T, E = MotorError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MotorError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("servo angle {0} outside -90..=90 degrees")]
    AngleOutOfRange(f64),
    #[error("invalid distance: {0} m")]
    InvalidDistance(f64),
    #[error("{motor}: motion timed out after {travelled_m:.3} of {target_m:.3} m")]
    Timeout {
        motor: String,
        travelled_m: f64,
        target_m: f64,
    },
    #[error("{0}: distance watcher ended without reporting")]
    WatcherLost(String),
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
    #[error("actuator '{0}' already registered")]
    DuplicateActuator(String),
}
