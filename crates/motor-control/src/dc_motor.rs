//! Encoder-tracked DC motor
//!
//! Starting a motion powers the H-bridge and spawns a distance watcher task
//! that samples the encoder until the requested distance has been covered,
//! then cuts power and reports through a [`Motion`] handle.
//!
//! Every start and stop bumps the motor's generation while holding the
//! output lock. A watcher only cuts power if its generation is still the
//! current one, so a watcher left over from an earlier motion can never stop
//! the motion that replaced it.

use crate::{
    Actuator, Direction, Encoder, HBridge, MotionOutcome, MotorError, MotorSettings, Result,
};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

struct Output {
    bridge: Box<dyn HBridge>,
    generation: u64,
}

struct Shared {
    name: String,
    output: Mutex<Output>,
    encoder: Encoder,
    settings: MotorSettings,
    running: watch::Sender<bool>,
    generation: watch::Sender<u64>,
}

impl Shared {
    /// Cut power on behalf of the watcher for `generation`.
    fn finish(&self, generation: u64, result: Result<MotionOutcome>) -> Result<MotionOutcome> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| MotorError::Poisoned("motor output"))?;
        if output.generation != generation {
            return Ok(MotionOutcome::Cancelled);
        }
        let stopped = output.bridge.stop();
        self.running.send_replace(output.bridge.is_active());
        drop(output);

        stopped?;
        result
    }
}

/// Handle to a motion in flight
pub struct Motion {
    motor: String,
    direction: Direction,
    target_m: f64,
    done: oneshot::Receiver<Result<MotionOutcome>>,
}

impl Motion {
    pub fn motor(&self) -> &str {
        &self.motor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn target(&self) -> f64 {
        self.target_m
    }

    /// Wait until the watcher reports how the motion ended.
    pub async fn finished(self) -> Result<MotionOutcome> {
        match self.done.await {
            Ok(result) => result,
            Err(_) => Err(MotorError::WatcherLost(self.motor)),
        }
    }
}

/// DC motor with an H-bridge output and a wheel encoder
pub struct DcMotor {
    shared: Arc<Shared>,
}

impl DcMotor {
    pub fn new(
        name: impl Into<String>,
        bridge: Box<dyn HBridge>,
        encoder: Encoder,
        settings: MotorSettings,
    ) -> Self {
        let (running, _) = watch::channel(bridge.is_active());
        let (generation, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                output: Mutex::new(Output {
                    bridge,
                    generation: 0,
                }),
                encoder,
                settings,
                running,
                generation,
            }),
        }
    }

    /// Drive forward until `distance_m` has been travelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn forward(&self, distance_m: f64) -> Result<Motion> {
        self.start(Direction::Forward, distance_m)
    }

    /// Drive backward until `distance_m` has been travelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn backward(&self, distance_m: f64) -> Result<Motion> {
        self.start(Direction::Backward, distance_m)
    }

    pub fn encoder(&self) -> &Encoder {
        &self.shared.encoder
    }

    pub fn settings(&self) -> &MotorSettings {
        &self.shared.settings
    }

    /// Resolves once the output is no longer driving the motor.
    pub async fn wait_stopped(&self) {
        let mut running = self.shared.running.subscribe();
        let _ = running.wait_for(|running| !*running).await;
    }

    fn start(&self, direction: Direction, distance_m: f64) -> Result<Motion> {
        if !distance_m.is_finite() || distance_m < 0.0 {
            return Err(MotorError::InvalidDistance(distance_m));
        }

        let shared = &self.shared;
        let speed = shared.settings.speed;
        let mut output = shared
            .output
            .lock()
            .map_err(|_| MotorError::Poisoned("motor output"))?;

        output.generation += 1;
        let generation = output.generation;
        shared.encoder.begin_tracking();

        let driven = match direction {
            Direction::Forward => output.bridge.forward(speed),
            Direction::Backward => output.bridge.backward(speed),
        };
        if let Err(e) = driven {
            if let Err(stop_err) = output.bridge.stop() {
                warn!("{}: stop after failed start also failed: {}", shared.name, stop_err);
            }
            shared.running.send_replace(output.bridge.is_active());
            shared.generation.send_replace(generation);
            return Err(e);
        }
        shared.running.send_replace(true);
        shared.generation.send_replace(generation);
        let cancel = shared.generation.subscribe();
        drop(output);

        debug!(
            "{}: {} {:.3} m at speed {:.2} (origin {} pulses)",
            shared.name,
            direction,
            distance_m,
            speed,
            shared.encoder.tracking_origin()
        );

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(watch_distance(
            Arc::clone(shared),
            generation,
            distance_m,
            cancel,
            done_tx,
        ));

        Ok(Motion {
            motor: shared.name.clone(),
            direction,
            target_m: distance_m,
            done: done_rx,
        })
    }
}

impl Actuator for DcMotor {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn stop(&self) -> Result<()> {
        let shared = &self.shared;
        let mut output = shared
            .output
            .lock()
            .map_err(|_| MotorError::Poisoned("motor output"))?;
        output.generation += 1;
        let result = output.bridge.stop();
        shared.running.send_replace(output.bridge.is_active());
        shared.generation.send_replace(output.generation);
        result
    }

    fn is_running(&self) -> bool {
        *self.shared.running.borrow()
    }
}

async fn watch_distance(
    shared: Arc<Shared>,
    generation: u64,
    target_m: f64,
    mut cancel: watch::Receiver<u64>,
    done: oneshot::Sender<Result<MotionOutcome>>,
) {
    let deadline = Instant::now() + shared.settings.timeout;

    let outcome = loop {
        let travelled_m = shared.encoder.travelled();
        if travelled_m >= target_m {
            let result = shared.finish(generation, Ok(MotionOutcome::Reached { travelled_m }));
            if matches!(result, Ok(MotionOutcome::Reached { .. })) {
                info!("{}: reached {:.3} m ({:.3} m requested)", shared.name, travelled_m, target_m);
            }
            break result;
        }

        if Instant::now() >= deadline {
            warn!(
                "{}: no completion after {:?}, cutting power at {:.3} of {:.3} m",
                shared.name, shared.settings.timeout, travelled_m, target_m
            );
            break shared.finish(
                generation,
                Err(MotorError::Timeout {
                    motor: shared.name.clone(),
                    travelled_m,
                    target_m,
                }),
            );
        }

        tokio::select! {
            _ = sleep(shared.settings.poll_interval) => {}
            _ = cancel.changed() => {}
        }

        if *cancel.borrow() != generation {
            debug!("{}: watcher for motion #{} cancelled", shared.name, generation);
            break Ok(MotionOutcome::Cancelled);
        }
    };

    // The caller may have dropped the handle; nothing left to report to.
    let _ = done.send(outcome);
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{SimulatedWheel, WheelGeometry};
    use std::time::Duration;

    const GEOMETRY: WheelGeometry = WheelGeometry {
        circumference_m: 0.2,
        signals_per_rotation: 40,
    };

    // 200 pulses/s at full speed, 100 pulses/s (0.5 m/s) at the default speed
    fn motor_with_wheel() -> (DcMotor, SimulatedWheel) {
        let wheel = SimulatedWheel::new(200.0);
        let encoder = Encoder::new(Arc::new(wheel.clone()), GEOMETRY);
        let settings = MotorSettings {
            speed: 0.5,
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        };
        let motor = DcMotor::new("left", Box::new(wheel.clone()), encoder, settings);
        (motor, wheel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_reaches_target() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();

        let motion = motor.forward(1.0)?;
        assert!(motor.is_running());
        assert_eq!(wheel.direction(), Some(Direction::Forward));

        let outcome = motion.finished().await?;
        match outcome {
            MotionOutcome::Reached { travelled_m } => {
                assert!(travelled_m >= 1.0);
                // at most one poll interval of overshoot (0.5 m/s * 10 ms)
                assert!(travelled_m < 1.0 + 0.005 + 1e-9);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!motor.is_running());
        assert!(!wheel.is_driving());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_backward_uses_backward_output() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();
        let motion = motor.backward(0.1)?;
        assert_eq!(wheel.direction(), Some(Direction::Backward));
        assert!(motion.finished().await?.is_reached());
        // pulses are counted regardless of direction
        assert!(motor.encoder().pulses() >= 20);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_distance_stops_immediately() -> anyhow::Result<()> {
        let (motor, _wheel) = motor_with_wheel();
        let outcome = motor.forward(0.0)?.finished().await?;
        assert_eq!(outcome, MotionOutcome::Reached { travelled_m: 0.0 });
        assert!(!motor.is_running());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_distance_rejected() {
        let (motor, wheel) = motor_with_wheel();
        assert!(matches!(motor.forward(-1.0), Err(MotorError::InvalidDistance(_))));
        assert!(matches!(motor.forward(f64::NAN), Err(MotorError::InvalidDistance(_))));
        assert_eq!(wheel.start_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_watcher() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();
        let motion = motor.forward(10.0)?;
        tokio::time::sleep(Duration::from_millis(100)).await;

        motor.stop()?;
        assert!(!motor.is_running());
        assert_eq!(motion.finished().await?, MotionOutcome::Cancelled);
        // only the explicit stop touched the output
        assert_eq!(wheel.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_watcher_does_not_stop_next_motion() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();
        let first = motor.forward(0.05)?;
        motor.stop()?;
        let second = motor.forward(1.0)?;

        assert_eq!(first.finished().await?, MotionOutcome::Cancelled);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(motor.is_running(), "second motion must still be running");
        assert!(wheel.is_driving());

        assert!(second.finished().await?.is_reached());
        assert!(!motor.is_running());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();
        motor.stop()?;
        motor.stop()?;
        assert!(!motor.is_running());
        assert!(!wheel.is_driving());
        assert_eq!(wheel.direction(), None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_encoder_times_out() -> anyhow::Result<()> {
        let (motor, wheel) = motor_with_wheel();
        wheel.set_stalled(true);
        let result = motor.forward(1.0)?.finished().await;
        match result {
            Err(MotorError::Timeout { travelled_m, target_m, .. }) => {
                assert_eq!(travelled_m, 0.0);
                assert_eq!(target_m, 1.0);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!motor.is_running());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_leaves_motor_stopped() {
        let (motor, wheel) = motor_with_wheel();
        wheel.set_failing(true);
        assert!(matches!(motor.forward(1.0), Err(MotorError::Io(_))));
        assert!(!motor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stopped() -> anyhow::Result<()> {
        let (motor, _wheel) = motor_with_wheel();
        let _motion = motor.forward(0.2)?;
        motor.wait_stopped().await;
        assert!(!motor.is_running());
        Ok(())
    }
}
