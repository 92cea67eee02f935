//! Manouvre sequencer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::{AvoidOutcome, AvoidSensors, ObstAvoidError, Params, Phase};
use crate::{
    drive::{Drive, MAX_SPEED},
    range_sensor::{object_present, MAX_CONFIDENCE},
    steer_ctrl::{Mode, NavState},
};
use hw_if::{MotorActuator, MotorError, MotorId, Rotation};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Obstacle avoidance sequencer.
#[derive(Debug, Clone, Default)]
pub struct ObstAvoid {
    params: Params,
}

/// State of one run of the manouvre.
struct Run<'a, M, S> {
    params: &'a Params,
    drive: &'a mut Drive<M>,
    nav: &'a mut NavState,
    sensors: &'a S,
    terminate: &'a AtomicBool,
    phase: Phase,

    /// Previous side reading, carried across attempts and phases.
    last_reading: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A 90 degree pivot on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pivot {
    Left,
    Right,
}

/// Why a run stopped early.
enum Interrupt {
    Terminated,
    Motor(Phase, MotorError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ObstAvoid {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Run the whole manouvre.
    ///
    /// On completion the robot is back on the line, driving forward, and `nav.mode` is set to
    /// [`Mode::Line`]. If terminated the mode is left as it was.
    pub fn run<M, S>(
        &self,
        drive: &mut Drive<M>,
        nav: &mut NavState,
        sensors: &S,
        terminate: &AtomicBool,
    ) -> Result<AvoidOutcome, ObstAvoidError>
    where
        M: MotorActuator,
        S: AvoidSensors,
    {
        let mut run = Run {
            params: &self.params,
            drive,
            nav,
            sensors,
            terminate,
            phase: Phase::TurnAway,
            last_reading: true,
        };

        match run.sequence() {
            Ok(()) => {
                run.nav.mode = Mode::Line;
                info!("Obstacle avoided, back on the line");
                Ok(AvoidOutcome::Completed)
            }
            Err(Interrupt::Terminated) => {
                info!("Obstacle avoidance terminated during the {:?} phase", run.phase);
                Ok(AvoidOutcome::Terminated)
            }
            Err(Interrupt::Motor(phase, source)) => Err(ObstAvoidError::Motor { phase, source }),
        }
    }
}

impl<'a, M: MotorActuator, S: AvoidSensors> Run<'a, M, S> {
    fn sequence(&mut self) -> Result<(), Interrupt> {
        self.enter(Phase::TurnAway);
        self.turn_90(Pivot::Right)?;

        // Drive until the side sensor no longer sees the obstacle
        self.enter(Phase::Pass);
        self.track_side(false)?;

        self.enter(Phase::TurnAlong);
        self.turn_90(Pivot::Left)?;

        // Find the obstacle again, then drive until past its trailing edge
        self.enter(Phase::Redetect);
        self.track_side(true)?;
        self.enter(Phase::Clear);
        self.track_side(false)?;

        self.enter(Phase::TurnBack);
        self.turn_90(Pivot::Left)?;

        self.enter(Phase::LineSearch);
        self.find_line()?;

        self.enter(Phase::Rejoin);
        self.turn_90(Pivot::Right)
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Obstacle avoidance: {:?}", phase);
        self.phase = phase;
    }

    /// Pivot 90 degrees on the spot, then drive forward at full speed.
    fn turn_90(&mut self, pivot: Pivot) -> Result<(), Interrupt> {
        let (left, right, hold_s) = match pivot {
            Pivot::Left => (Rotation::Backward, Rotation::Forward, self.params.turn_left_s),
            Pivot::Right => (Rotation::Forward, Rotation::Backward, self.params.turn_right_s),
        };

        self.set_wheels(left, right)?;
        self.wait(Duration::from_secs_f64(hold_s.max(0.0)))?;
        self.set_wheels(Rotation::Forward, Rotation::Forward)
    }

    fn set_wheels(&mut self, left: Rotation, right: Rotation) -> Result<(), Interrupt> {
        let phase = self.phase;
        let fault = |e| Interrupt::Motor(phase, e);

        self.drive
            .set_motor(MotorId::Left, left, MAX_SPEED)
            .map_err(fault)?;
        self.drive
            .set_motor(MotorId::Right, right, MAX_SPEED)
            .map_err(fault)?;

        self.nav.speed_left = MAX_SPEED;
        self.nav.speed_right = MAX_SPEED;

        Ok(())
    }

    /// Poll the side sensor until it settles on `target`, repeated for each attempt.
    ///
    /// Agreeing consecutive readings build confidence, a disagreement halves it.
    fn track_side(&mut self, target: bool) -> Result<(), Interrupt> {
        let max_distance = self.params.side_max_distance_cm;

        for attempt in 0..self.params.attempts {
            let mut confidence: u8 = 0;

            loop {
                self.check_terminate()?;

                let reading = object_present(self.sensors.side_reading(), max_distance);
                if reading == self.last_reading {
                    confidence = (confidence + 1).min(MAX_CONFIDENCE);
                } else {
                    confidence /= 2;
                }
                self.last_reading = reading;

                if reading == target && confidence >= self.params.confidence_threshold {
                    debug!("Side reading settled on {} (attempt {})", target, attempt + 1);
                    break;
                }

                thread::sleep(self.poll_period());
            }
        }

        Ok(())
    }

    /// Drive until at least two line sensors see the line.
    fn find_line(&mut self) -> Result<(), Interrupt> {
        loop {
            self.check_terminate()?;

            if self.sensors.line_snapshot().active_count() >= 2 {
                info!("Line found");
                return Ok(());
            }

            thread::sleep(self.poll_period());
        }
    }

    /// Sleep for `duration` in poll period chunks.
    fn wait(&self, duration: Duration) -> Result<(), Interrupt> {
        let deadline = Instant::now() + duration;

        loop {
            self.check_terminate()?;

            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }

            thread::sleep(self.poll_period().min(deadline - now));
        }
    }

    fn check_terminate(&self) -> Result<(), Interrupt> {
        match self.terminate.load(Ordering::Relaxed) {
            true => Err(Interrupt::Terminated),
            false => Ok(()),
        }
    }

    fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(self.params.poll_period_s.max(0.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{drive, line_array::LineSnapshot, range_sensor::RangeReading};
    use hw_if::{sim::SimMotors, MotorCommand};
    use std::collections::VecDeque;
    use std::sync::{atomic::AtomicUsize, Arc, Mutex};

    const NEAR: RangeReading = RangeReading {
        distance_cm: 20.0,
        confidence: 100,
    };
    const FAR: RangeReading = RangeReading {
        distance_cm: 150.0,
        confidence: 100,
    };

    /// Plays back side readings in order, then repeats the last one.
    struct Scripted {
        side: Mutex<VecDeque<RangeReading>>,
        last: Mutex<RangeReading>,
        line: LineSnapshot,
        side_polls: AtomicUsize,
    }

    impl Scripted {
        fn new(side: Vec<RangeReading>, line: LineSnapshot) -> Self {
            Self {
                side: Mutex::new(side.into()),
                last: Mutex::new(FAR),
                line,
                side_polls: AtomicUsize::new(0),
            }
        }
    }

    impl AvoidSensors for Scripted {
        fn side_reading(&self) -> RangeReading {
            self.side_polls.fetch_add(1, Ordering::SeqCst);
            let mut last = self.last.lock().unwrap();
            if let Some(r) = self.side.lock().unwrap().pop_front() {
                *last = r;
            }
            *last
        }

        fn line_snapshot(&self) -> LineSnapshot {
            self.line
        }
    }

    fn fast_params() -> Params {
        Params {
            poll_period_s: 0.0001,
            turn_left_s: 0.002,
            turn_right_s: 0.001,
            ..Params::default()
        }
    }

    fn pivots(motors: &SimMotors) -> Vec<(MotorId, Rotation)> {
        motors
            .history()
            .into_iter()
            .filter_map(|c| match c {
                MotorCommand::Direction(m, r) => Some((m, r)),
                _ => None,
            })
            .collect()
    }

    /// Raise `terminate` once `polls` side readings have been taken and `settle` has passed.
    ///
    /// Returns the instant the flag was raised.
    fn terminate_after(
        sensors: Arc<Scripted>,
        polls: usize,
        settle: Duration,
        terminate: Arc<AtomicBool>,
    ) -> thread::JoinHandle<Instant> {
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while sensors.side_polls.load(Ordering::SeqCst) < polls && Instant::now() < deadline {
                thread::sleep(Duration::from_micros(200));
            }
            thread::sleep(settle);
            terminate.store(true, Ordering::SeqCst);
            Instant::now()
        })
    }

    /// Run a manouvre which is terminated part way and check it stopped promptly.
    fn run_terminated(side: Vec<RangeReading>, line: LineSnapshot, polls: usize) -> SimMotors {
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());
        let mut nav = NavState::default();
        nav.mode = Mode::Obstacle;

        let sensors = Arc::new(Scripted::new(side, line));
        let terminate = Arc::new(AtomicBool::new(false));
        let raiser = terminate_after(
            sensors.clone(),
            polls,
            Duration::from_millis(20),
            terminate.clone(),
        );

        let outcome = ObstAvoid::new(fast_params())
            .run(&mut d, &mut nav, &*sensors, &terminate)
            .unwrap();
        let returned = Instant::now();
        let raised = raiser.join().unwrap();

        assert_eq!(outcome, AvoidOutcome::Terminated);
        assert_eq!(nav.mode, Mode::Obstacle);
        assert!(returned.duration_since(raised) < Duration::from_millis(20));

        motors
    }

    #[test]
    fn test_full_manouvre() {
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());
        let mut nav = NavState::new(60);
        nav.mode = Mode::Obstacle;

        // Passed, seen again along its side, then passed for good
        let mut side = vec![FAR; 160];
        side.extend(vec![NEAR; 400]);
        side.push(FAR);
        let sensors = Scripted::new(side, LineSnapshot::inner(true, true, false));
        let terminate = AtomicBool::new(false);

        let outcome = ObstAvoid::new(fast_params())
            .run(&mut d, &mut nav, &sensors, &terminate)
            .unwrap();

        assert_eq!(outcome, AvoidOutcome::Completed);
        assert_eq!(nav.mode, Mode::Line);
        assert_eq!((nav.speed_left, nav.speed_right), (100, 100));

        // Right motor is mounted inverted
        use MotorId::*;
        use Rotation::*;
        let right_pivot = [(Left, Forward), (Right, Forward)];
        let left_pivot = [(Left, Backward), (Right, Backward)];
        let ahead = [(Left, Forward), (Right, Backward)];
        let expected: Vec<_> = [right_pivot, ahead, left_pivot, ahead, left_pivot, ahead, right_pivot, ahead]
            .iter()
            .flatten()
            .copied()
            .collect();
        assert_eq!(pivots(&motors), expected);

        // Each tracking phase takes 51 + 50 + 50 polls at best
        assert!(sensors.side_polls.load(Ordering::SeqCst) >= 3 * 151);
        assert_eq!(sensors.side.lock().unwrap().len(), 0);
        assert_eq!(motors.motor(Left).1, 100);
        assert_eq!(motors.motor(Right).1, 100);
    }

    #[test]
    fn test_terminate_mid_pass() {
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());
        let mut nav = NavState::default();
        nav.mode = Mode::Obstacle;

        // The obstacle never clears so the pass phase only ends on termination
        let sensors = Scripted::new(vec![NEAR], LineSnapshot::default());
        let terminate = Arc::new(AtomicBool::new(false));

        let t = terminate.clone();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            t.store(true, Ordering::SeqCst);
            Instant::now()
        });

        let outcome = ObstAvoid::new(fast_params())
            .run(&mut d, &mut nav, &sensors, &terminate)
            .unwrap();
        let returned = Instant::now();
        let raised = raiser.join().unwrap();

        assert_eq!(outcome, AvoidOutcome::Terminated);
        assert_eq!(nav.mode, Mode::Obstacle);
        assert!(returned.duration_since(raised) < Duration::from_millis(20));

        // Only the first right pivot and straightening were commanded
        assert!(!pivots(&motors).contains(&(MotorId::Left, Rotation::Backward)));
        assert_eq!(pivots(&motors).len(), 4);
    }

    #[test]
    fn test_terminate_during_redetect() {
        // Passed after 151 polls, then never seen again
        let motors = run_terminated(vec![FAR], LineSnapshot::default(), 200);

        // Right pivot, ahead, left pivot, ahead and nothing after
        let p = pivots(&motors);
        assert_eq!(p.len(), 8);
        assert_eq!(p[4], (MotorId::Left, Rotation::Backward));
    }

    #[test]
    fn test_terminate_during_clear() {
        // Passed after 151 polls, seen again after 151 more, then never passed
        let mut side = vec![FAR; 151];
        side.push(NEAR);
        let motors = run_terminated(side, LineSnapshot::default(), 340);

        assert_eq!(pivots(&motors).len(), 8);
    }

    #[test]
    fn test_terminate_during_line_search() {
        let mut side = vec![FAR; 151];
        side.extend(vec![NEAR; 151]);
        side.push(FAR);

        // A single sensor on the line is not enough to stop the search
        let line = LineSnapshot::inner(false, true, false);
        let motors = run_terminated(side, line, 453);

        // Turned back, but never turned to rejoin the line
        let p = pivots(&motors);
        assert_eq!(p.len(), 12);
        assert_eq!(p[8], (MotorId::Left, Rotation::Backward));
        assert_eq!(p[9], (MotorId::Right, Rotation::Backward));
    }

    #[test]
    fn test_terminate_during_turn() {
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());
        let mut nav = NavState::default();
        let sensors = Scripted::new(vec![], LineSnapshot::default());
        let terminate = AtomicBool::new(true);

        let params = Params {
            turn_right_s: 10.0,
            ..fast_params()
        };
        let start = Instant::now();
        let outcome = ObstAvoid::new(params)
            .run(&mut d, &mut nav, &sensors, &terminate)
            .unwrap();

        assert_eq!(outcome, AvoidOutcome::Terminated);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(sensors.side_polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_motor_fault() {
        let motors = SimMotors::new();
        motors.set_fail(true);
        let mut d = Drive::new(motors, &drive::Params::default());
        let mut nav = NavState::default();
        let sensors = Scripted::new(vec![], LineSnapshot::default());

        let res = ObstAvoid::new(fast_params()).run(
            &mut d,
            &mut nav,
            &sensors,
            &AtomicBool::new(false),
        );
        assert!(matches!(
            res,
            Err(ObstAvoidError::Motor {
                phase: Phase::TurnAway,
                ..
            })
        ));
    }
}
