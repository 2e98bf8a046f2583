//! The rover and its dispatch loop
//!
//! Producers hand parsed batches to a [`RobotHandle`]; a single dispatch loop
//! takes commands from the queue one at a time and turns them into wheel and
//! servo motions. A Stop submitted while a command is executing preempts it;
//! a Stop queued behind a command in the same batch waits its turn. Either
//! way the Stop is then processed in queue order: every actuator is stopped,
//! the commands after it are dropped and the loop goes idle until new
//! commands arrive.

use crate::queue::CommandQueue;
use crate::{MotionConfig, Result, RobotConfig, RobotError, RobotHardware};
use command_parser::{Command, CommandKind};
use motor_control::{Actuator, ActuatorRegistry, DcMotor, Direction, Motion, MotorError};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shared {
    queue: CommandQueue,
    last_completed: Mutex<Option<OffsetDateTime>>,
    wake: Notify,
}

/// Snapshot of the dispatch loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub running: bool,
    pub current: Option<Command>,
    pub queued: usize,
    /// RFC 3339 time the last command ran to completion
    pub last_completed_at: Option<String>,
}

/// How one dispatched command ended
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(Command),
    /// Cut short by a Stop submitted while it was executing
    Preempted(Command),
    Stopped { dropped: usize },
    Failed { command: Command, error: RobotError },
}

/// Cloneable producer side of a [`Robot`]
#[derive(Clone)]
pub struct RobotHandle {
    shared: Arc<Shared>,
}

impl RobotHandle {
    /// Queue a parsed batch and wake the dispatch loop.
    ///
    /// Returns `false` for an empty batch, which changes nothing.
    pub fn submit(&self, commands: Vec<Command>) -> bool {
        if commands.is_empty() {
            debug!("Ignoring empty command batch");
            return false;
        }
        let count = commands.len();
        let queued = self.shared.queue.append(commands);
        self.shared.wake.notify_one();
        info!("Queued {} command(s), {} waiting", count, queued);
        true
    }

    /// Queue a Stop.
    pub fn stop(&self) {
        self.submit(vec![Command::stop("stop")]);
    }

    pub fn status(&self) -> RobotStatus {
        let last_completed = *lock(&self.shared.last_completed);
        let queue = self.shared.queue.snapshot();
        RobotStatus {
            running: queue.running,
            current: queue.current,
            queued: queue.queued,
            last_completed_at: last_completed.and_then(|t| t.format(&Rfc3339).ok()),
        }
    }
}

pub struct Robot {
    hardware: RobotHardware,
    registry: ActuatorRegistry,
    motion: MotionConfig,
    shared: Arc<Shared>,
}

impl Robot {
    pub fn new(config: &RobotConfig, hardware: RobotHardware) -> Result<Self> {
        config.validate()?;
        let registry = hardware.registry()?;
        info!("Robot ready with actuators: {}", registry.names().join(", "));
        Ok(Self {
            hardware,
            registry,
            motion: config.motion.clone(),
            shared: Arc::default(),
        })
    }

    pub fn handle(&self) -> RobotHandle {
        RobotHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn hardware(&self) -> &RobotHardware {
        &self.hardware
    }

    /// Dispatch commands forever. Sleeps for `idle_poll_ms` (or until a
    /// batch is submitted) whenever there is nothing to do.
    pub async fn run(&self) {
        info!("Dispatch loop started");
        loop {
            if self.dispatch_next().await.is_none() {
                self.idle().await;
            }
        }
    }

    /// Dispatch until `shutdown` resolves, then stop every actuator.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {}
        }
        self.stop_actuators();
        info!("Dispatch loop stopped");
    }

    /// Execute the head of the queue, if the loop is armed and there is one.
    pub async fn dispatch_next(&self) -> Option<DispatchOutcome> {
        let command = self.shared.queue.take_next()?;
        if command.is_stop() {
            let outcome = self.halt(&command);
            self.shared.queue.finish();
            return Some(outcome);
        }

        info!("Executing {}", command);
        let outcome = match self.execute_preemptible(&command).await {
            Ok(true) => {
                *lock(&self.shared.last_completed) = Some(OffsetDateTime::now_utc());
                debug!("Completed {}", command);
                DispatchOutcome::Completed(command)
            }
            Ok(false) => {
                warn!("{} preempted by stop", command);
                DispatchOutcome::Preempted(command)
            }
            Err(error) => {
                error!("{} failed: {}", command, error);
                self.stop_actuators();
                DispatchOutcome::Failed { command, error }
            }
        };
        self.shared.queue.finish();
        Some(outcome)
    }

    /// Drive both wheels straight for `distance_m` (negative is backward)
    /// with the steering centered.
    pub async fn drive(&self, distance_m: f64) -> Result<()> {
        let hw = &self.hardware;
        if !hw.servo.is_centered() {
            hw.servo.center()?;
        }
        self.wait_servo().await;
        if distance_m == 0.0 {
            debug!("Zero distance, wheels stay idle");
            return Ok(());
        }

        let direction = if distance_m > 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let (left, right) = self.start_wheels(direction, direction, distance_m.abs())?;
        let (left, right) = tokio::join!(left.finished(), right.finished());
        debug!("Drive ended: left {:?}, right {:?}", left, right);
        left?;
        right?;
        self.wait_stopped().await;
        Ok(())
    }

    /// Turn on the spot by `angle_degrees` (positive is right). The servo
    /// tilts toward the turn and stays there until the next drive.
    pub async fn turn(&self, angle_degrees: f64) -> Result<()> {
        let hw = &self.hardware;
        hw.servo.turn(self.motion.tilt_degrees.copysign(angle_degrees))?;
        self.wait_servo().await;

        let arc = self.turn_arc(angle_degrees);
        let (left, right) = if angle_degrees >= 0.0 {
            self.start_wheels(Direction::Forward, Direction::Backward, arc)?
        } else {
            self.start_wheels(Direction::Backward, Direction::Forward, arc)?
        };
        let (left, right) = tokio::join!(left.finished(), right.finished());
        debug!("Turn ended: left {:?}, right {:?}", left, right);
        left?;
        right?;
        self.wait_stopped().await;
        Ok(())
    }

    /// Start both wheels, or neither: the left wheel is stopped again if the
    /// right one fails to start.
    fn start_wheels(
        &self,
        left: Direction,
        right: Direction,
        distance_m: f64,
    ) -> Result<(Motion, Motion)> {
        let left_motion = start_motion(&self.hardware.left, left, distance_m)?;
        match start_motion(&self.hardware.right, right, distance_m) {
            Ok(right_motion) => Ok((left_motion, right_motion)),
            Err(e) => {
                if let Err(stop_error) = self.hardware.left.stop() {
                    warn!("Failed to stop left wheel: {}", stop_error);
                }
                Err(e.into())
            }
        }
    }

    /// Distance each wheel covers for a turn of `angle_degrees`
    pub fn turn_arc(&self, angle_degrees: f64) -> f64 {
        self.motion.turn_arc_m * angle_degrees.abs() / 90.0
    }

    async fn execute(&self, command: &Command) -> Result<()> {
        match command.kind() {
            CommandKind::Stop => Ok(self.registry.stop_all()?),
            CommandKind::Forward => self.drive(command.effective_distance()).await,
            CommandKind::Backward => self.drive(-command.effective_distance()).await,
            CommandKind::TurnRight => self.turn(90.0).await,
            CommandKind::TurnLeft => self.turn(-90.0).await,
            CommandKind::Turn180 => self.turn(180.0).await,
        }
    }

    /// Run `command` unless a Stop is submitted while it executes.
    /// `Ok(false)` means it was preempted and the actuators stopped.
    async fn execute_preemptible(&self, command: &Command) -> Result<bool> {
        let actuation = self.execute(command);
        tokio::pin!(actuation);
        loop {
            if self.shared.queue.stop_requested() {
                self.stop_actuators();
                return Ok(false);
            }
            tokio::select! {
                result = &mut actuation => return result.map(|()| true),
                _ = self.shared.wake.notified() => {}
            }
        }
    }

    fn halt(&self, command: &Command) -> DispatchOutcome {
        let dropped = self.shared.queue.halt();
        self.stop_actuators();
        info!(
            "Stop ({}): dropped {} queued command(s)",
            command.source().command,
            dropped
        );
        DispatchOutcome::Stopped { dropped }
    }

    fn stop_actuators(&self) {
        if let Err(e) = self.registry.stop_all() {
            error!("Failed to stop actuators: {}", e);
        }
    }

    async fn wait_servo(&self) {
        while self.hardware.servo.is_running() {
            sleep(Duration::from_millis(self.motion.watcher_poll_ms)).await;
        }
    }

    async fn wait_stopped(&self) {
        self.hardware.left.wait_stopped().await;
        self.hardware.right.wait_stopped().await;
        self.wait_servo().await;
    }

    async fn idle(&self) {
        tokio::select! {
            _ = sleep(self.motion.idle_poll()) => {}
            _ = self.shared.wake.notified() => {}
        }
    }
}

fn start_motion(
    motor: &DcMotor,
    direction: Direction,
    distance_m: f64,
) -> std::result::Result<Motion, MotorError> {
    match direction {
        Direction::Forward => motor.forward(distance_m),
        Direction::Backward => motor.backward(distance_m),
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{mock_hardware, MockRig};

    fn robot_with(config: RobotConfig) -> (Robot, MockRig) {
        let (hardware, rig) = mock_hardware(&config.motion);
        (Robot::new(&config, hardware).unwrap(), rig)
    }

    fn robot() -> (Robot, MockRig) {
        robot_with(RobotConfig::default())
    }

    fn forward(metres: u32) -> Command {
        Command::new(CommandKind::Forward, "frem").with_multiplier(metres.to_string(), metres)
    }

    fn approx(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 0.02
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_forward_and_backward() {
        let (robot, rig) = robot();

        robot.drive(1.0).await.unwrap();
        assert!(approx(robot.hardware().left.encoder().travelled(), 1.0));
        assert!(approx(robot.hardware().right.encoder().travelled(), 1.0));
        assert_eq!(rig.servo.value(), Some(0.0));
        assert!(!rig.left.is_driving());
        assert!(!rig.right.is_driving());

        let task = tokio::spawn({
            let rig = rig.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                (rig.left.direction(), rig.right.direction())
            }
        });
        robot.drive(-0.5).await.unwrap();
        assert_eq!(
            task.await.unwrap(),
            (Some(Direction::Backward), Some(Direction::Backward))
        );
        assert!(approx(robot.hardware().left.encoder().travelled(), 0.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_distance_only_centers() {
        let (robot, rig) = robot();
        robot.turn(90.0).await.unwrap();
        let starts = rig.left.start_count();

        robot.drive(0.0).await.unwrap();
        assert_eq!(rig.servo.value(), Some(0.0));
        assert_eq!(rig.left.start_count(), starts);
        assert_eq!(rig.right.start_count(), starts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_directions_and_arcs() {
        let (robot, rig) = robot();

        let task = tokio::spawn({
            let rig = rig.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                (rig.left.direction(), rig.right.direction())
            }
        });
        robot.turn(90.0).await.unwrap();
        assert_eq!(
            task.await.unwrap(),
            (Some(Direction::Forward), Some(Direction::Backward))
        );
        assert_eq!(rig.servo.value(), Some(0.5));
        assert!(approx(robot.hardware().left.encoder().travelled(), 0.25));

        robot.turn(-90.0).await.unwrap();
        assert_eq!(rig.servo.value(), Some(-0.5));

        robot.turn(180.0).await.unwrap();
        assert_eq!(robot.turn_arc(180.0), 0.5);
        assert!(approx(robot.hardware().right.encoder().travelled(), 0.5));
        assert_eq!(rig.servo.value(), Some(0.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_in_fifo_order() {
        let (robot, _rig) = robot();
        let handle = robot.handle();

        assert!(handle.submit(vec![
            forward(1),
            Command::new(CommandKind::TurnLeft, "venstre"),
        ]));
        assert!(handle.submit(vec![Command::new(CommandKind::Backward, "tilbage")]));
        assert_eq!(handle.status().queued, 3);

        let mut kinds = Vec::new();
        while let Some(DispatchOutcome::Completed(command)) = robot.dispatch_next().await {
            kinds.push(command.kind());
        }
        assert_eq!(
            kinds,
            vec![CommandKind::Forward, CommandKind::TurnLeft, CommandKind::Backward]
        );

        let status = handle.status();
        assert!(!status.running);
        assert_eq!(status.queued, 0);
        assert_eq!(status.current, None);
        assert!(status.last_completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_queue() {
        let (robot, rig) = robot();
        let handle = robot.handle();
        handle.submit(vec![forward(1), Command::stop("stop"), forward(2)]);

        // the stop was queued behind the first command, which runs to completion
        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Completed(_))
        ));
        assert_eq!(rig.left.start_count(), 1);
        assert!(approx(robot.hardware().left.encoder().travelled(), 1.0));
        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Stopped { dropped: 1 })
        ));
        assert!(robot.dispatch_next().await.is_none());
        assert!(!handle.status().running);
        assert_eq!(handle.status().queued, 0);
        assert!(!rig.left.is_driving());
        assert!(!rig.servo.is_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_preempts_command_in_flight() {
        let (robot, rig) = robot();
        let robot = Arc::new(robot);
        let handle = robot.handle();
        let task = tokio::spawn({
            let robot = robot.clone();
            async move { robot.run().await }
        });

        handle.submit(vec![forward(5)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rig.left.is_driving());
        assert!(rig.right.is_driving());
        assert_eq!(handle.status().current.map(|c| c.kind()), Some(CommandKind::Forward));

        handle.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!rig.left.is_driving());
        assert!(!rig.right.is_driving());
        let status = handle.status();
        assert!(!status.running);
        assert_eq!(status.queued, 0);
        assert_eq!(status.current, None);
        assert!(robot.hardware().left.encoder().travelled() < 1.0);

        // the loop picks up new work after a stop
        handle.submit(vec![Command::new(CommandKind::TurnLeft, "venstre")]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.left.direction(), Some(Direction::Backward));
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_preempts_only_the_command_in_flight() {
        let (robot, _rig) = robot();
        let robot = Arc::new(robot);
        let handle = robot.handle();
        let outcomes = tokio::spawn({
            let robot = robot.clone();
            async move {
                let mut kinds = Vec::new();
                while let Some(outcome) = robot.dispatch_next().await {
                    kinds.push(match outcome {
                        DispatchOutcome::Completed(c) => format!("completed {}", c.kind()),
                        DispatchOutcome::Preempted(c) => format!("preempted {}", c.kind()),
                        DispatchOutcome::Stopped { dropped } => format!("stopped {dropped}"),
                        DispatchOutcome::Failed { command, .. } => {
                            format!("failed {}", command.kind())
                        }
                    });
                }
                kinds
            }
        });

        handle.submit(vec![forward(5), Command::new(CommandKind::TurnRight, "højre")]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        // the turn was queued before the stop and still runs
        let kinds = outcomes.await.unwrap();
        assert_eq!(
            kinds,
            vec!["preempted forward", "completed turn right", "stopped 0"]
        );
        assert!(!handle.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoken_stop_after_command_drives_first() {
        let (robot, rig) = robot();
        let handle = robot.handle();
        let commands = command_parser::parse_command("frem stop");
        assert_eq!(commands.len(), 2);
        handle.submit(commands);

        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Completed(_))
        ));
        assert!(rig.left.start_count() > 0);
        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Stopped { dropped: 0 })
        ));
        assert!(robot.dispatch_next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_start_failure_leaves_no_wheel_running() {
        let (robot, rig) = robot();
        rig.right.set_failing(true);

        assert!(matches!(
            robot.drive(1.0).await,
            Err(RobotError::Motor(MotorError::Io(_)))
        ));
        assert!(!rig.left.is_driving());
        assert_eq!(rig.left.start_count(), 1);

        assert!(robot.turn(90.0).await.is_err());
        assert!(!rig.left.is_driving());
        assert!(!rig.right.is_driving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_actuation_stops_and_continues() {
        let (robot, rig) = robot();
        let handle = robot.handle();
        rig.right.set_failing(true);
        handle.submit(vec![forward(1), Command::new(CommandKind::TurnLeft, "venstre")]);

        let outcome = robot.dispatch_next().await;
        assert!(matches!(
            outcome,
            Some(DispatchOutcome::Failed {
                error: RobotError::Motor(MotorError::Io(_)),
                ..
            })
        ));
        // the left wheel had already started and must be stopped again
        assert!(!rig.left.is_driving());
        assert!(handle.status().running);

        rig.right.set_failing(false);
        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Completed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_wheel_times_out() {
        let mut config = RobotConfig::default();
        config.motion.motion_timeout_ms = 2_000;
        let (robot, rig) = robot_with(config);
        rig.left.set_stalled(true);

        robot.handle().submit(vec![forward(1)]);
        assert!(matches!(
            robot.dispatch_next().await,
            Some(DispatchOutcome::Failed {
                error: RobotError::Motor(MotorError::Timeout { .. }),
                ..
            })
        ));
        assert!(!rig.left.is_driving());
        assert!(!rig.right.is_driving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_submit_is_ignored() {
        let (robot, _rig) = robot();
        let handle = robot.handle();
        assert!(!handle.submit(Vec::new()));
        assert!(!handle.status().running);
        assert!(robot.dispatch_next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_stops_actuators() {
        let (robot, rig) = robot();
        let handle = robot.handle();
        handle.submit(vec![forward(5)]);

        robot
            .run_until(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert!(!rig.left.is_driving());
        assert!(!rig.right.is_driving());
    }

    #[test]
    fn test_status_serializes() {
        let status = RobotStatus {
            running: true,
            current: Some(Command::new(CommandKind::TurnRight, "højre")),
            queued: 2,
            last_completed_at: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["queued"], 2);
        assert_eq!(json["current"]["kind"], "turn_right");
    }
}
