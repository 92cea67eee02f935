//! Implementations for the SteerCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{Axis, Decision, Direction, Mode, Params, SteerCtrlError};
use crate::{
    drive::{Drive, MAX_SPEED},
    line_array::LineSnapshot,
    range_sensor::MAX_CONFIDENCE,
};
use hw_if::{MotorActuator, MotorId};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Steering control module state
#[derive(Debug, Default)]
pub struct SteerCtrl {
    pub(crate) params: Params,

    pub(crate) nav: NavState,
}

/// Data required to initialise SteerCtrl.
#[derive(Debug, Clone)]
pub struct InitData {
    pub params: Params,

    /// Speed both wheels are running at when control starts.
    pub initial_speed: u8,
}

/// Navigation state, shared by steering control and obstacle avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavState {
    /// Last direction actually commanded.
    pub last_direction: Direction,

    /// Last direction requested by the line sensors.
    pub last_requested: Direction,

    pub mode: Mode,

    /// Wheel speeds in percent.
    pub speed_left: u8,
    pub speed_right: u8,

    pub inner_confidence: u8,
    pub outer_confidence: u8,
}

/// Speeds the wheels should be ramped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeedDemand {
    pub direction: Direction,

    /// Targets in percent, out of range values are clamped by the ramp.
    pub left_target: i16,
    pub right_target: i16,

    pub step: u8,
}

/// Status report for SteerCtrl processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub decision: Decision,

    /// Value of the relevant counter after the request, zero on hold.
    pub confidence: u8,

    /// A speed demand was produced this cycle.
    pub cmd_issued: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavState {
    pub fn new(initial_speed: u8) -> Self {
        Self {
            last_direction: Direction::Forward,
            last_requested: Direction::Forward,
            mode: Mode::Line,
            speed_left: initial_speed.min(MAX_SPEED),
            speed_right: initial_speed.min(MAX_SPEED),
            inner_confidence: 0,
            outer_confidence: 0,
        }
    }
}

impl Default for NavState {
    fn default() -> Self {
        Self::new(MAX_SPEED)
    }
}

impl State for SteerCtrl {
    type InitData = InitData;
    type InitError = SteerCtrlError;

    type InputData = LineSnapshot;
    type OutputData = Option<SpeedDemand>;
    type StatusReport = StatusReport;
    type ProcError = SteerCtrlError;

    /// Initialise the SteerCtrl module.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let p = &init_data.params;

        if p.confidence_threshold > MAX_CONFIDENCE {
            return Err(SteerCtrlError::InvalidParams(format!(
                "confidence_threshold {} can never be reached",
                p.confidence_threshold
            )));
        }
        if p.straight_speed > MAX_SPEED || p.turn_delta > MAX_SPEED {
            return Err(SteerCtrlError::InvalidParams(
                "speeds must be between 0 and 100 %".into(),
            ));
        }

        self.params = init_data.params;
        self.nav = NavState::new(init_data.initial_speed);

        Ok(())
    }

    /// Evaluate one line snapshot.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let decision = self.evaluate(input_data);

        let mut report = StatusReport {
            decision,
            confidence: 0,
            cmd_issued: false,
        };

        let output = match decision {
            Decision::Hold => None,
            Decision::Request(direction, axis) => {
                let (issue, confidence) = self.request(direction, axis);
                report.confidence = confidence;

                match issue {
                    true => self.demand(direction),
                    false => None,
                }
            }
        };
        report.cmd_issued = output.is_some();

        trace!("SteerCtrl {:?} -> {:?}", input_data, report);

        Ok((output, report))
    }
}

impl SteerCtrl {
    pub fn nav_state(&self) -> &NavState {
        &self.nav
    }

    pub fn nav_state_mut(&mut self) -> &mut NavState {
        &mut self.nav
    }

    /// Ramp the wheels to a demand produced by `proc`, tracking the speeds reached.
    pub fn apply<M: MotorActuator>(
        &mut self,
        drive: &mut Drive<M>,
        demand: &SpeedDemand,
    ) -> Result<(), SteerCtrlError> {
        let err = |source| SteerCtrlError::Drive {
            direction: demand.direction,
            source,
        };

        match drive.ramp_speed(MotorId::Left, self.nav.speed_left, demand.left_target, demand.step) {
            Ok(s) => self.nav.speed_left = s,
            Err(e) => {
                self.nav.speed_left = e.reached;
                return Err(err(e));
            }
        }

        match drive.ramp_speed(
            MotorId::Right,
            self.nav.speed_right,
            demand.right_target,
            demand.step,
        ) {
            Ok(s) => self.nav.speed_right = s,
            Err(e) => {
                self.nav.speed_right = e.reached;
                return Err(err(e));
            }
        }

        Ok(())
    }

    /// Turn a snapshot into a decision.
    ///
    /// The outer sensors are checked first, and a lone outer sensor overrides the inner ones.
    pub(crate) fn evaluate(&mut self, snapshot: &LineSnapshot) -> Decision {
        if let Some(outer) = snapshot.outer {
            match outer {
                [false, true] => return Decision::Request(Direction::Left, Axis::Outer),
                [true, false] => return Decision::Request(Direction::Right, Axis::Outer),
                _ => self.nav.outer_confidence = 0,
            }
        }

        let request = |d| Decision::Request(d, Axis::Inner);

        match snapshot.inner {
            [true, true, true] => Decision::Hold,
            [true, true, false] => request(Direction::Left),
            [false, true, true] => request(Direction::Right),
            [true, false, true] => Decision::Hold,
            [true, false, false] => request(Direction::Left),
            [false, true, false] => request(Direction::Straight),
            [false, false, true] => request(Direction::Right),
            [false, false, false] => match self.nav.last_direction {
                Direction::Left | Direction::Right => request(self.nav.last_direction),
                _ => Decision::Hold,
            },
        }
    }

    /// Record a request, returning whether it should be issued and the counter value.
    fn request(&mut self, direction: Direction, axis: Axis) -> (bool, u8) {
        let repeated = direction == self.nav.last_requested;

        let counter = match axis {
            Axis::Inner => &mut self.nav.inner_confidence,
            Axis::Outer => &mut self.nav.outer_confidence,
        };

        *counter = match repeated {
            true => (*counter + 1).min(MAX_CONFIDENCE),
            false => 0,
        };
        let confidence = *counter;

        self.nav.last_requested = direction;

        let issue = confidence >= self.params.confidence_threshold;
        if issue {
            self.nav.last_direction = direction;
        }

        (issue, confidence)
    }

    fn demand(&self, direction: Direction) -> Option<SpeedDemand> {
        let delta = self.params.turn_delta as i16;
        let left = self.nav.speed_left as i16;
        let right = self.nav.speed_right as i16;

        let (left_target, right_target, step) = match direction {
            Direction::Left => (left - delta, right + delta, self.params.turn_ramp_step),
            Direction::Right => (left + delta, right - delta, self.params.turn_ramp_step),
            Direction::Straight => (
                self.params.straight_speed as i16,
                self.params.straight_speed as i16,
                self.params.straight_ramp_step,
            ),
            Direction::Forward | Direction::Backward => return None,
        };

        Some(SpeedDemand {
            direction,
            left_target,
            right_target,
            step,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive;
    use hw_if::sim::SimMotors;

    fn steer_ctrl() -> SteerCtrl {
        let mut s = SteerCtrl::default();
        s.init(InitData {
            params: Params::default(),
            initial_speed: 100,
        })
        .unwrap();
        s
    }

    fn inner(l: bool, c: bool, r: bool) -> LineSnapshot {
        LineSnapshot::inner(l, c, r)
    }

    fn five(ol: bool, l: bool, c: bool, r: bool, or: bool) -> LineSnapshot {
        LineSnapshot {
            inner: [l, c, r],
            outer: Some([ol, or]),
        }
    }

    #[test]
    fn test_initial_state() {
        let s = steer_ctrl();
        assert_eq!(s.nav.last_direction, Direction::Forward);
        assert_eq!(s.nav.last_requested, Direction::Forward);
        assert_eq!(s.nav.mode, Mode::Line);
        assert_eq!((s.nav.speed_left, s.nav.speed_right), (100, 100));
        assert_eq!((s.nav.inner_confidence, s.nav.outer_confidence), (0, 0));
    }

    #[test]
    fn test_init_rejects_bad_params() {
        let mut s = SteerCtrl::default();
        let res = s.init(InitData {
            params: Params {
                confidence_threshold: 101,
                ..Params::default()
            },
            initial_speed: 100,
        });
        assert!(matches!(res, Err(SteerCtrlError::InvalidParams(_))));
    }

    #[test]
    fn test_inner_table() {
        let mut s = steer_ctrl();
        let req = |d| Decision::Request(d, Axis::Inner);

        assert_eq!(s.evaluate(&inner(true, true, true)), Decision::Hold);
        assert_eq!(s.evaluate(&inner(true, true, false)), req(Direction::Left));
        assert_eq!(s.evaluate(&inner(false, true, true)), req(Direction::Right));
        assert_eq!(s.evaluate(&inner(true, false, true)), Decision::Hold);
        assert_eq!(s.evaluate(&inner(true, false, false)), req(Direction::Left));
        assert_eq!(s.evaluate(&inner(false, true, false)), req(Direction::Straight));
        assert_eq!(s.evaluate(&inner(false, false, true)), req(Direction::Right));

        // Nothing seen: hold unless the last command was a turn
        assert_eq!(s.evaluate(&inner(false, false, false)), Decision::Hold);
        s.nav.last_direction = Direction::Right;
        assert_eq!(s.evaluate(&inner(false, false, false)), req(Direction::Right));
    }

    #[test]
    fn test_outer_first() {
        let mut s = steer_ctrl();
        let req = |d| Decision::Request(d, Axis::Outer);

        assert_eq!(s.evaluate(&five(false, false, true, false, true)), req(Direction::Left));
        assert_eq!(s.evaluate(&five(true, false, true, false, false)), req(Direction::Right));

        s.nav.outer_confidence = 7;
        assert_eq!(
            s.evaluate(&five(true, false, true, false, true)),
            Decision::Request(Direction::Straight, Axis::Inner)
        );
        assert_eq!(s.nav.outer_confidence, 0);
    }

    #[test]
    fn test_hysteresis() {
        let mut s = steer_ctrl();
        let left = inner(true, true, false);

        // The first request is a change and only resets the counter
        for i in 0..8 {
            let (out, report) = s.proc(&left).unwrap();
            assert!(out.is_none());
            assert_eq!(report.confidence, i);
            assert_eq!(s.nav.last_direction, Direction::Forward);
        }

        let (out, report) = s.proc(&left).unwrap();
        assert!(report.cmd_issued);
        assert_eq!(s.nav.last_direction, Direction::Left);
        assert_eq!(
            out,
            Some(SpeedDemand {
                direction: Direction::Left,
                left_target: 95,
                right_target: 105,
                step: 1,
            })
        );

        // A contrary request resets the counter
        let (out, report) = s.proc(&inner(false, false, true)).unwrap();
        assert!(out.is_none());
        assert_eq!(report.confidence, 0);
        assert_eq!(s.nav.inner_confidence, 0);
        assert_eq!(s.nav.last_requested, Direction::Right);
        assert_eq!(s.nav.last_direction, Direction::Left);
    }

    #[test]
    fn test_hold_keeps_counters() {
        let mut s = steer_ctrl();
        for _ in 0..4 {
            s.proc(&inner(false, true, false)).unwrap();
        }
        let before = s.nav;

        let (out, report) = s.proc(&inner(true, true, true)).unwrap();
        assert!(out.is_none());
        assert_eq!(report.decision, Decision::Hold);
        assert_eq!(s.nav, before);
    }

    #[test]
    fn test_straight_ramps_to_full_speed() {
        let mut s = steer_ctrl();
        s.nav.speed_left = 40;
        s.nav.speed_right = 73;

        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());

        for _ in 0..10 {
            let (out, _) = s.proc(&inner(false, true, false)).unwrap();
            if let Some(demand) = out {
                s.apply(&mut d, &demand).unwrap();
            }
        }

        assert_eq!(s.nav.last_direction, Direction::Straight);
        assert_eq!((s.nav.speed_left, s.nav.speed_right), (100, 100));
        assert_eq!(motors.motor(MotorId::Left).1, 100);
        assert_eq!(motors.motor(MotorId::Right).1, 100);
    }

    #[test]
    fn test_turn_saturates() {
        let mut s = steer_ctrl();
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());

        for _ in 0..40 {
            let (out, _) = s.proc(&inner(false, false, true)).unwrap();
            if let Some(demand) = out {
                s.apply(&mut d, &demand).unwrap();
            }
        }

        // 32 right commands at 5 % each
        assert_eq!((s.nav.speed_left, s.nav.speed_right), (100, 0));
    }

    #[test]
    fn test_apply_failure_tracks_speed() {
        let mut s = steer_ctrl();
        let motors = SimMotors::new();
        let mut d = Drive::new(motors.clone(), &drive::Params::default());
        motors.set_fail(true);

        let demand = SpeedDemand {
            direction: Direction::Left,
            left_target: 95,
            right_target: 100,
            step: 1,
        };
        assert!(matches!(
            s.apply(&mut d, &demand),
            Err(SteerCtrlError::Drive { direction: Direction::Left, .. })
        ));
        assert_eq!(s.nav.speed_left, 100);
    }

    #[test]
    fn test_confidence_bounds() {
        let mut s = steer_ctrl();
        let seq = [
            five(false, false, true, false, true),
            five(false, false, true, false, true),
            inner(false, true, false),
            five(false, true, true, false, false),
        ];

        for i in 0..1000 {
            // Long runs of the same snapshot, broken up now and then
            let snap = seq[(i / 150) % seq.len()];
            s.proc(&snap).unwrap();
            assert!(s.nav.inner_confidence <= 100);
            assert!(s.nav.outer_confidence <= 100);
        }
    }
}
