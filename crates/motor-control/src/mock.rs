use crate::{Direction, HBridge, MotorError, PulseCounter, Result, ServoOutput};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

struct Drive {
    direction: Direction,
    speed: f32,
    since: Instant,
}

struct WheelState {
    pulses_per_second: f64,
    banked: f64,
    drive: Option<Drive>,
    stalled: bool,
    failing: bool,
    starts: u32,
    stops: u32,
}

impl WheelState {
    fn pending(&self) -> f64 {
        match &self.drive {
            Some(drive) if !self.stalled => {
                drive.since.elapsed().as_secs_f64() * self.pulses_per_second * f64::from(drive.speed)
            }
            _ => 0.0,
        }
    }

    fn bank(&mut self) {
        self.banked += self.pending();
        if let Some(drive) = &mut self.drive {
            drive.since = Instant::now();
        }
    }

    fn start(&mut self, direction: Direction, speed: f32) -> Result<()> {
        if self.failing {
            return Err(MotorError::Io("simulated H-bridge fault".to_string()));
        }
        self.bank();
        self.drive = Some(Drive {
            direction,
            speed: speed.clamp(0.0, 1.0),
            since: Instant::now(),
        });
        self.starts += 1;
        Ok(())
    }
}

/// A simulated wheel: H-bridge output and encoder in one. While driven the
/// encoder advances at `pulses_per_second × speed`, on the tokio clock, so
/// paused-time tests run deterministically.
///
/// Clones share the same wheel.
#[derive(Clone)]
pub struct SimulatedWheel {
    state: Arc<Mutex<WheelState>>,
}

impl SimulatedWheel {
    /// `pulses_per_second` is the encoder rate at full speed.
    pub fn new(pulses_per_second: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(WheelState {
                pulses_per_second,
                banked: 0.0,
                drive: None,
                stalled: false,
                failing: false,
                starts: 0,
                stops: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WheelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop producing pulses even while driven
    pub fn set_stalled(&self, stalled: bool) {
        let mut state = self.lock();
        state.bank();
        state.stalled = stalled;
    }

    /// Make every forward/backward command fail with an I/O error
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn direction(&self) -> Option<Direction> {
        self.lock().drive.as_ref().map(|d| d.direction)
    }

    pub fn is_driving(&self) -> bool {
        self.lock().drive.is_some()
    }

    pub fn start_count(&self) -> u32 {
        self.lock().starts
    }

    pub fn stop_count(&self) -> u32 {
        self.lock().stops
    }
}

impl HBridge for SimulatedWheel {
    fn forward(&mut self, speed: f32) -> Result<()> {
        self.lock().start(Direction::Forward, speed)
    }

    fn backward(&mut self, speed: f32) -> Result<()> {
        self.lock().start(Direction::Backward, speed)
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.bank();
        state.drive = None;
        state.stops += 1;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_driving()
    }
}

impl PulseCounter for SimulatedWheel {
    fn pulses(&self) -> u64 {
        let state = self.lock();
        (state.banked + state.pending()).floor() as u64
    }
}

#[derive(Default)]
struct ServoLog {
    value: Option<f64>,
    history: Vec<f64>,
}

/// In-memory servo output that records every commanded value.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct MockServo {
    log: Arc<Mutex<ServoLog>>,
}

impl MockServo {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServoLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn value(&self) -> Option<f64> {
        self.lock().value
    }

    pub fn is_attached(&self) -> bool {
        self.lock().value.is_some()
    }

    pub fn history(&self) -> Vec<f64> {
        self.lock().history.clone()
    }
}

impl ServoOutput for MockServo {
    fn set_value(&mut self, value: f64) -> Result<()> {
        let mut log = self.lock();
        log.value = Some(value);
        log.history.push(value);
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.lock().value = None;
        Ok(())
    }
}
