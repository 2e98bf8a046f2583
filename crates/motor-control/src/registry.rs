use crate::{Actuator, MotorError, Result};
use std::sync::Arc;
use tracing::{error, info};

/// The set of actuators owned by one robot, for "stop everything" handling.
#[derive(Clone, Default)]
pub struct ActuatorRegistry {
    actuators: Vec<Arc<dyn Actuator>>,
}

impl ActuatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, actuator: Arc<dyn Actuator>) -> Result<()> {
        if self.actuators.iter().any(|a| a.name() == actuator.name()) {
            return Err(MotorError::DuplicateActuator(actuator.name().to_string()));
        }
        self.actuators.push(actuator);
        Ok(())
    }

    /// Stop every actuator. All are attempted even if some fail; the first
    /// failure is returned.
    pub fn stop_all(&self) -> Result<()> {
        let mut first_error = None;
        for actuator in &self.actuators {
            if let Err(e) = actuator.stop() {
                error!("Failed to stop {}: {}", actuator.name(), e);
                first_error.get_or_insert(e);
            }
        }
        info!("Stopped {} actuator(s)", self.actuators.len());
        first_error.map_or(Ok(()), Err)
    }

    pub fn any_running(&self) -> bool {
        self.actuators.iter().any(|a| a.is_running())
    }

    pub fn names(&self) -> Vec<String> {
        self.actuators.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}
