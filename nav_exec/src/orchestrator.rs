//! # Orchestrator
//!
//! Owns the shared sensor state, starts one worker per sensor, and runs the control loop on the
//! calling thread. The control loop hands the motors to either steering control or obstacle
//! avoidance depending on the navigation mode.
//!
//! Shutdown is cooperative: the termination flag is raised, every worker is joined, and only then
//! are the motors stopped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;

use hw_if::{MotorActuator, MotorError, MotorId, Rotation};
use util::module::State;

use crate::{
    drive::Drive,
    encoder::EncoderChannel,
    hardware::{Hardware, SensorHardware},
    line_array,
    obst_avoid::{AvoidOutcome, ObstAvoid},
    params::NavExecParams,
    range_sensor::{object_present, RangeReading, RangeSensor},
    shared::SharedState,
    steer_ctrl::{self, Mode, NavState, SteerCtrl, SteerCtrlError},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period at which the run timer checks the termination flag.
const RUN_TIMER_POLL: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Orchestrator<M> {
    params: NavExecParams,
    shared: SharedState,

    drive: Drive<M>,
    steer_ctrl: SteerCtrl,
    obst_avoid: ObstAvoid,

    workers: Vec<(String, JoinHandle<()>)>,
    summary: RunSummary,
}

/// Summary of a run, saved into the session at shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of control cycles executed.
    pub cycles: u64,

    /// Units: seconds
    pub run_time_s: f64,

    /// Speed demands issued by steering control.
    pub steer_cmds: u64,

    /// Obstacle avoidance manouvres started and completed.
    pub obstacle_mnvrs: u64,
    pub obstacle_mnvrs_completed: u64,

    /// Failed writes to the motor driver.
    pub motor_faults: u64,

    pub final_state: NavState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Could not initialise steering control: {0}")]
    SteerCtrlInit(SteerCtrlError),

    #[error("Could not spawn the {0} worker: {1}")]
    Spawn(String, std::io::Error),

    #[error("The {0} worker panicked")]
    WorkerPanicked(String),

    #[error("Could not stop the motors: {0}")]
    Stop(MotorError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<M: MotorActuator> Orchestrator<M> {
    /// Take ownership of the hardware and start every sensor worker.
    ///
    /// If any worker fails to start the ones already running are stopped and joined.
    pub fn start(
        params: NavExecParams,
        hw: Hardware<M>,
        terminate: Arc<AtomicBool>,
    ) -> Result<Self, OrchestratorError> {
        let mut steer_ctrl = SteerCtrl::default();
        steer_ctrl
            .init(steer_ctrl::InitData {
                params: params.steer_ctrl.clone(),
                initial_speed: params.drive.initial_speed,
            })
            .map_err(OrchestratorError::SteerCtrlInit)?;

        let initial_range = RangeReading {
            distance_cm: 0.0,
            confidence: params.range_sensor.initial_confidence,
        };
        let shared = SharedState::new(hw.sensors.has_outer(), initial_range, terminate);

        let mut orch = Self {
            drive: Drive::new(hw.motors, &params.drive),
            steer_ctrl,
            obst_avoid: ObstAvoid::new(params.obst_avoid.clone()),
            workers: Vec::new(),
            summary: RunSummary::new(NavState::new(params.drive.initial_speed)),
            shared,
            params,
        };

        let spawned = orch.spawn_workers(hw.sensors);

        if let Err(e) = spawned {
            orch.shared.terminate.store(true, Ordering::SeqCst);
            orch.join_workers();
            return Err(e);
        }

        info!("{} workers started", orch.workers.len());

        Ok(orch)
    }

    fn spawn_workers(&mut self, sensors: SensorHardware) -> Result<(), OrchestratorError> {
        let p = &self.params;
        let terminate = &self.shared.terminate;

        let SensorHardware {
            clock,
            front_sonar,
            side_sonar,
            left_encoder,
            right_encoder,
            line_inner,
            line_outer,
        } = sensors;

        // Line sensors
        let [l, c, r] = line_inner;
        let inner = vec![("line_left", l), ("line_centre", c), ("line_right", r)];
        let outer = match line_outer {
            Some([ol, or]) => vec![("line_outer_left", ol), ("line_outer_right", or)],
            None => Vec::new(),
        };
        let outer_cells = self.shared.line.outer.iter().flatten();
        let cells = self.shared.line.inner.iter().chain(outer_cells);

        for ((name, pin), cell) in inner.into_iter().chain(outer).zip(cells) {
            let h = line_array::spawn_pin_worker(
                name,
                pin,
                cell.clone(),
                &p.line_array,
                terminate.clone(),
            )
            .map_err(spawn_err(name))?;
            self.workers.push((name.to_string(), h));
        }

        // Range sensors
        for (name, pins, cell) in vec![
            ("front_sonar", front_sonar, &self.shared.front_range),
            ("side_sonar", side_sonar, &self.shared.side_range),
        ] {
            let sensor = RangeSensor::new(
                pins.trigger,
                pins.echo,
                clock.clone(),
                p.range_sensor.clone(),
                terminate.clone(),
            );
            let h = sensor
                .spawn(name, cell.clone())
                .map_err(spawn_err(name))?;
            self.workers.push((name.to_string(), h));
        }

        // Encoders
        for (name, transport, cs, cell) in vec![
            ("left_encoder", left_encoder, p.bus.left_encoder_cs, &self.shared.left_speed),
            ("right_encoder", right_encoder, p.bus.right_encoder_cs, &self.shared.right_speed),
        ] {
            let chan = EncoderChannel::new(transport, cs, p.encoder.clone());
            let h = chan
                .spawn(name, cell.clone(), terminate.clone())
                .map_err(spawn_err(name))?;
            self.workers.push((name.to_string(), h));
        }

        Ok(())
    }

    /// Run the control loop until the termination flag is raised.
    ///
    /// If `run_time` is given the flag is raised once it has elapsed.
    pub fn run(&mut self, run_time: Option<Duration>) -> Result<(), OrchestratorError> {
        let start = Instant::now();

        if let Some(run_time) = run_time {
            let terminate = self.shared.terminate.clone();
            let h = thread::Builder::new()
                .name("run_timer".into())
                .spawn(move || {
                    while !terminate.load(Ordering::Relaxed) {
                        if start.elapsed() >= run_time {
                            info!("Run time of {:.1} s elapsed", run_time.as_secs_f64());
                            terminate.store(true, Ordering::SeqCst);
                            break;
                        }
                        thread::sleep(RUN_TIMER_POLL);
                    }
                })
                .map_err(|e| OrchestratorError::Spawn("run_timer".into(), e))?;
            self.workers.push(("run_timer".into(), h));
        }

        let cycle_period = Duration::from_secs_f64(self.params.control.cycle_period_s.max(0.0));
        let status_every = (self.params.control.status_log_period_s
            / self.params.control.cycle_period_s.max(1e-6))
        .max(1.0) as u64;

        // Both wheels start forward
        let initial_speed = self.params.drive.initial_speed;
        for &motor in &[MotorId::Left, MotorId::Right] {
            if let Err(e) = self.drive.set_motor(motor, Rotation::Forward, initial_speed) {
                warn!("Could not start the {:?} motor: {}", motor, e);
                self.summary.motor_faults += 1;
            }
        }

        info!("Control loop started");

        while !self.shared.terminated() {
            self.cycle();

            if self.summary.cycles % status_every == 0 {
                self.log_status();
            }

            thread::sleep(cycle_period);
        }

        self.summary.run_time_s = start.elapsed().as_secs_f64();
        info!("Control loop stopped after {} cycles", self.summary.cycles);

        Ok(())
    }

    /// Stop every worker, then the motors.
    pub fn shutdown(mut self) -> Result<RunSummary, OrchestratorError> {
        info!("Shutting down");
        self.shared.terminate.store(true, Ordering::SeqCst);

        let panicked = self.join_workers();

        self.drive.stop_all().map_err(OrchestratorError::Stop)?;

        if let Some(name) = panicked {
            return Err(OrchestratorError::WorkerPanicked(name));
        }

        self.summary.final_state = *self.steer_ctrl.nav_state();

        Ok(self.summary)
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn nav_state(&self) -> &NavState {
        self.steer_ctrl.nav_state()
    }

    /// One control cycle.
    fn cycle(&mut self) {
        self.summary.cycles += 1;

        let front = self.shared.front_range.load();
        let mode = self.steer_ctrl.nav_state().mode;

        if mode == Mode::Obstacle
            || object_present(front, self.obst_avoid.params().front_max_distance_cm)
        {
            info!(
                "Obstacle at {:.1} cm (confidence {}), avoiding",
                front.distance_cm, front.confidence
            );
            self.avoid();
        } else {
            self.steer();
        }
    }

    fn steer(&mut self) {
        let snapshot = self.shared.line.snapshot();

        let demand = match self.steer_ctrl.proc(&snapshot) {
            Ok((Some(demand), _)) => demand,
            Ok((None, _)) => return,
            Err(e) => {
                warn!("SteerCtrl error: {}", e);
                return;
            }
        };

        self.summary.steer_cmds += 1;

        if let Err(e) = self.steer_ctrl.apply(&mut self.drive, &demand) {
            warn!("{}", e);
            self.summary.motor_faults += 1;
        }
    }

    fn avoid(&mut self) {
        self.summary.obstacle_mnvrs += 1;
        self.steer_ctrl.nav_state_mut().mode = Mode::Obstacle;

        let outcome = self.obst_avoid.run(
            &mut self.drive,
            self.steer_ctrl.nav_state_mut(),
            &self.shared,
            &self.shared.terminate,
        );

        match outcome {
            Ok(AvoidOutcome::Completed) => {
                self.summary.obstacle_mnvrs_completed += 1;
                info!("Returning to line following");
            }
            Ok(AvoidOutcome::Terminated) => (),
            Err(e) => {
                // Give control back to steering, it reissues speeds on its next command
                warn!("Obstacle avoidance failed: {}", e);
                self.summary.motor_faults += 1;
                self.steer_ctrl.nav_state_mut().mode = Mode::Line;
            }
        }
    }

    fn log_status(&self) {
        let front = self.shared.front_range.load();
        let side = self.shared.side_range.load();
        let nav = self.steer_ctrl.nav_state();

        debug!(
            "Wheels: L {:.1} cm/s ({} %), R {:.1} cm/s ({} %)",
            self.shared.left_speed.load(),
            nav.speed_left,
            self.shared.right_speed.load(),
            nav.speed_right
        );
        debug!(
            "Range: front {:.1} cm ({}), side {:.1} cm ({}), mode {:?}, last {:?}",
            front.distance_cm,
            front.confidence,
            side.distance_cm,
            side.confidence,
            nav.mode,
            nav.last_direction
        );
    }

    /// Join every worker, returning the name of the first one that panicked.
    fn join_workers(&mut self) -> Option<String> {
        let mut panicked = None;

        for (name, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("The {} worker panicked", name);
                panicked.get_or_insert(name);
            }
        }

        panicked
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn spawn_err(name: &str) -> impl FnOnce(std::io::Error) -> OrchestratorError {
    let name = name.to_string();
    move |e| OrchestratorError::Spawn(name, e)
}

impl RunSummary {
    fn new(initial_state: NavState) -> Self {
        Self {
            cycles: 0,
            run_time_s: 0.0,
            steer_cmds: 0,
            obstacle_mnvrs: 0,
            obstacle_mnvrs_completed: 0,
            motor_faults: 0,
            final_state: initial_state,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{hardware::SimHandles, obst_avoid};
    use hw_if::{sim::SimMotors, MotorCommand};

    fn sim_params() -> NavExecParams {
        let mut p = NavExecParams::default();
        p.range_sensor.ping_period_ms = 5;
        p.obst_avoid = obst_avoid::Params {
            poll_period_s: 0.0001,
            turn_left_s: 0.001,
            turn_right_s: 0.001,
            ..obst_avoid::Params::default()
        };
        p
    }

    fn start(p: NavExecParams) -> (Orchestrator<SimMotors>, SimHandles, Arc<AtomicBool>) {
        let (hw, handles) = Hardware::simulated(&p);
        let terminate = Arc::new(AtomicBool::new(false));
        let orch = Orchestrator::start(p, hw, terminate.clone()).unwrap();
        (orch, handles, terminate)
    }

    #[test]
    fn test_follows_line() {
        let (mut orch, sim, _) = start(sim_params());
        sim.line_inner[1].set(true);
        sim.left_encoder.set_ticks(2160);

        orch.run(Some(Duration::from_millis(300))).unwrap();
        assert!((orch.shared().left_speed.load() - 4084.07).abs() < 0.01);

        let summary = orch.shutdown().unwrap();

        assert!(summary.cycles > 20);
        assert!(summary.steer_cmds > 0);
        assert_eq!(summary.obstacle_mnvrs, 0);
        assert_eq!(summary.final_state.last_direction, steer_ctrl::Direction::Straight);
        assert_eq!(summary.final_state.mode, Mode::Line);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["final_state"]["last_direction"], "Straight");
        assert_eq!(json["obstacle_mnvrs"], 0);

        // Stopped on shutdown
        assert_eq!(sim.motors.motor(MotorId::Left).1, 0);
        assert_eq!(sim.motors.motor(MotorId::Right).1, 0);
    }

    #[test]
    fn test_terminated_mid_avoidance() {
        let (mut orch, sim, terminate) = start(sim_params());

        // Front obstacle, nothing ever seen on the side
        sim.front_sonar.set_distance_cm(Some(20.0));

        let t = terminate.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            t.store(true, Ordering::SeqCst);
        });

        orch.run(None).unwrap();
        stopper.join().unwrap();
        assert_eq!(orch.nav_state().mode, Mode::Obstacle);

        let summary = orch.shutdown().unwrap();
        assert_eq!(summary.obstacle_mnvrs, 1);
        assert_eq!(summary.obstacle_mnvrs_completed, 0);
        assert_eq!(sim.motors.motor(MotorId::Left).1, 0);
        assert_eq!(sim.motors.motor(MotorId::Right).1, 0);
    }

    #[test]
    fn test_avoids_obstacle_and_returns_to_line() {
        let (mut orch, sim, _) = start(sim_params());

        // On the line, obstacle ahead, nothing beside the robot
        sim.line_inner[0].set(true);
        sim.line_inner[1].set(true);
        sim.front_sonar.set_distance_cm(Some(20.0));
        sim.side_sonar.set_distance_cm(Some(150.0));

        // Once turned along the obstacle it shows up on the side, then falls behind
        let world = sim.clone();
        let script = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(3);
            let turned_along = |w: &SimHandles| {
                w.motors
                    .history()
                    .iter()
                    .any(|c| matches!(c, MotorCommand::Direction(MotorId::Left, Rotation::Backward)))
            };
            while !turned_along(&world) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            world.front_sonar.set_distance_cm(Some(150.0));
            world.side_sonar.set_distance_cm(Some(20.0));

            thread::sleep(Duration::from_millis(400));
            world.side_sonar.set_distance_cm(Some(150.0));
        });

        orch.run(Some(Duration::from_secs(3))).unwrap();
        script.join().unwrap();

        let summary = orch.shutdown().unwrap();
        assert_eq!(summary.obstacle_mnvrs, 1);
        assert_eq!(summary.obstacle_mnvrs_completed, 1);
        assert_eq!(summary.motor_faults, 0);
        assert_eq!(summary.final_state.mode, Mode::Line);

        // Two left pivots, one along the obstacle and one back towards the line
        let left_pivots = sim
            .motors
            .history()
            .iter()
            .filter(|c| matches!(c, MotorCommand::Direction(MotorId::Left, Rotation::Backward)))
            .count();
        assert_eq!(left_pivots, 2);
    }

    #[test]
    fn test_motor_faults_do_not_stop_loop() {
        let (mut orch, sim, _) = start(sim_params());
        sim.line_inner[0].set(true);
        sim.motors.set_fail(true);

        orch.run(Some(Duration::from_millis(100))).unwrap();
        sim.motors.set_fail(false);

        let summary = orch.shutdown().unwrap();
        assert!(summary.cycles > 10);
        assert!(summary.motor_faults > 2);
    }

    #[test]
    fn test_bad_steer_params() {
        let mut p = sim_params();
        p.steer_ctrl.confidence_threshold = 200;
        let (hw, _) = Hardware::simulated(&p);

        let res = Orchestrator::start(p, hw, Arc::new(AtomicBool::new(false)));
        assert!(matches!(res, Err(OrchestratorError::SteerCtrlInit(_))));
    }
}
