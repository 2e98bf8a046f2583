use crate::Result;

/// One H-bridge channel: two direction outputs plus a speed output.
pub trait HBridge: Send {
    /// Drive forward at `speed` (0.0..=1.0).
    fn forward(&mut self, speed: f32) -> Result<()>;

    /// Drive backward at `speed` (0.0..=1.0).
    fn backward(&mut self, speed: f32) -> Result<()>;

    /// Cut power. Must be safe to call at any time.
    fn stop(&mut self) -> Result<()>;

    /// Whether the output is currently driving the motor.
    fn is_active(&self) -> bool;
}

/// Source of encoder pulses. The count only ever increases, whichever way
/// the wheel turns.
pub trait PulseCounter: Send + Sync {
    fn pulses(&self) -> u64;
}

/// Positional servo signal, driven by a value in `-1.0..=1.0`.
pub trait ServoOutput: Send {
    fn set_value(&mut self, value: f64) -> Result<()>;

    /// Stop sending the control signal.
    fn detach(&mut self) -> Result<()>;
}

/// What every actuator on the rover can do, whatever drives it.
pub trait Actuator: Send + Sync {
    fn name(&self) -> &str;

    /// Stop immediately without waiting for anything in flight.
    fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}
