//! # Drive primitives
//!
//! Wraps the motor driver with the robot's mounting configuration so the rest of the software can
//! work in terms of the direction each wheel moves the robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use hw_if::{MotorActuator, MotorError, MotorId, Rotation};
use util::maths::clamp;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Full speed, in percent.
pub const MAX_SPEED: u8 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the drive.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// Speed both wheels are driven at on startup, in percent.
    pub initial_speed: u8,

    /// Left motor is mounted so that electrical forward drives the robot backward.
    pub left_inverted: bool,

    /// Right motor is mounted so that electrical forward drives the robot backward.
    pub right_inverted: bool,
}

/// The two drive motors.
pub struct Drive<M> {
    motors: M,
    left_inverted: bool,
    right_inverted: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A ramp was interrupted by a failed write.
#[derive(Debug, thiserror::Error)]
#[error("Speed ramp stopped at {reached} %: {source}")]
pub struct RampError {
    /// Last speed successfully written.
    pub reached: u8,

    #[source]
    pub source: MotorError,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            initial_speed: MAX_SPEED,
            left_inverted: false,
            right_inverted: true,
        }
    }
}

impl<M: MotorActuator> Drive<M> {
    pub fn new(motors: M, params: &Params) -> Self {
        Self {
            motors,
            left_inverted: params.left_inverted,
            right_inverted: params.right_inverted,
        }
    }

    /// Electrical direction which turns the wheel the given way.
    pub fn electrical(&self, motor: MotorId, wheel: Rotation) -> Rotation {
        let inverted = match motor {
            MotorId::Left => self.left_inverted,
            MotorId::Right => self.right_inverted,
        };

        match inverted {
            true => wheel.reversed(),
            false => wheel,
        }
    }

    /// Set the speed of a wheel without changing its direction.
    pub fn set_speed(&mut self, motor: MotorId, percent: u8) -> Result<(), MotorError> {
        self.motors.set_duty_cycle(motor, percent.min(MAX_SPEED))
    }

    /// Stop the wheel, then run it in the given direction at the given speed.
    pub fn set_motor(
        &mut self,
        motor: MotorId,
        wheel: Rotation,
        percent: u8,
    ) -> Result<(), MotorError> {
        trace!("Set {:?} wheel {:?} at {} %", motor, wheel, percent);

        let rotation = self.electrical(motor, wheel);

        self.motors.set_duty_cycle(motor, 0)?;
        self.motors.set_direction(motor, rotation)?;
        self.set_speed(motor, percent)
    }

    /// Move a wheel's speed towards `target` in steps of `step`, writing each step.
    ///
    /// The target is limited to `[0, 100]` and never overshot. A step of zero goes straight to the
    /// target. Returns the speed reached.
    pub fn ramp_speed(
        &mut self,
        motor: MotorId,
        current: u8,
        target: i16,
        step: u8,
    ) -> Result<u8, RampError> {
        let target = clamp(target, 0, MAX_SPEED as i16) as u8;
        let mut speed = current;

        if step == 0 {
            self.set_speed(motor, target)
                .map_err(|source| RampError { reached: speed, source })?;
            return Ok(target);
        }

        while speed != target {
            let next = if speed < target {
                speed.saturating_add(step).min(target)
            } else {
                speed.saturating_sub(step).max(target)
            };

            self.set_speed(motor, next)
                .map_err(|source| RampError { reached: speed, source })?;
            speed = next;
        }

        Ok(speed)
    }

    /// Stop both wheels.
    ///
    /// Both are attempted even if the first fails, the first error is returned.
    pub fn stop_all(&mut self) -> Result<(), MotorError> {
        debug!("Stopping both motors");

        let left = self.motors.set_duty_cycle(MotorId::Left, 0);
        let right = self.motors.set_duty_cycle(MotorId::Right, 0);

        left.and(right)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hw_if::{sim::SimMotors, MotorCommand};

    fn drive() -> (Drive<SimMotors>, SimMotors) {
        let motors = SimMotors::new();
        (Drive::new(motors.clone(), &Params::default()), motors)
    }

    fn duties(motors: &SimMotors) -> Vec<u8> {
        motors
            .history()
            .into_iter()
            .filter_map(|c| match c {
                MotorCommand::DutyCycle(_, d) => Some(d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ramp_up_no_overshoot() {
        let (mut d, motors) = drive();
        assert_eq!(d.ramp_speed(MotorId::Left, 88, 100, 5).unwrap(), 100);
        assert_eq!(duties(&motors), vec![93, 98, 100]);
    }

    #[test]
    fn test_ramp_down_clamped() {
        let (mut d, motors) = drive();
        assert_eq!(d.ramp_speed(MotorId::Right, 3, -5, 1).unwrap(), 0);
        assert_eq!(duties(&motors), vec![2, 1, 0]);

        motors.clear_history();
        assert_eq!(d.ramp_speed(MotorId::Right, 98, 130, 1).unwrap(), 100);
        assert_eq!(duties(&motors), vec![99, 100]);
    }

    #[test]
    fn test_ramp_zero_step() {
        let (mut d, motors) = drive();
        assert_eq!(d.ramp_speed(MotorId::Left, 10, 70, 0).unwrap(), 70);
        assert_eq!(duties(&motors), vec![70]);
    }

    #[test]
    fn test_ramp_error() {
        let (mut d, motors) = drive();
        motors.set_fail(true);

        let e = d.ramp_speed(MotorId::Left, 50, 60, 1).unwrap_err();
        assert_eq!(e.reached, 50);
        assert!(motors.history().is_empty());
    }

    #[test]
    fn test_set_motor_mounting() {
        let (mut d, motors) = drive();
        d.set_motor(MotorId::Right, Rotation::Forward, 100).unwrap();
        d.set_motor(MotorId::Left, Rotation::Forward, 100).unwrap();

        assert_eq!(
            motors.history(),
            vec![
                MotorCommand::DutyCycle(MotorId::Right, 0),
                MotorCommand::Direction(MotorId::Right, Rotation::Backward),
                MotorCommand::DutyCycle(MotorId::Right, 100),
                MotorCommand::DutyCycle(MotorId::Left, 0),
                MotorCommand::Direction(MotorId::Left, Rotation::Forward),
                MotorCommand::DutyCycle(MotorId::Left, 100),
            ]
        );
    }

    #[test]
    fn test_stop_all() {
        let (mut d, motors) = drive();
        d.set_motor(MotorId::Left, Rotation::Forward, 80).unwrap();
        d.stop_all().unwrap();
        assert_eq!(motors.motor(MotorId::Left).1, 0);
        assert_eq!(motors.motor(MotorId::Right).1, 0);
    }
}
