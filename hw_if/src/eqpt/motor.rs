//! # Motor interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A dual H-bridge motor driver.
///
/// Directions here are electrical, mapping them to the direction the robot moves is the job of
/// the caller since it depends on how each motor is mounted.
pub trait MotorActuator {
    /// Set the rotation direction of a motor.
    fn set_direction(&mut self, motor: MotorId, rotation: Rotation) -> Result<(), MotorError>;

    /// Set the duty cycle of a motor, in percent. Values above 100 are rejected.
    fn set_duty_cycle(&mut self, motor: MotorId, percent: u8) -> Result<(), MotorError>;
}

impl<T: MotorActuator + ?Sized> MotorActuator for Box<T> {
    fn set_direction(&mut self, motor: MotorId, rotation: Rotation) -> Result<(), MotorError> {
        (**self).set_direction(motor, rotation)
    }

    fn set_duty_cycle(&mut self, motor: MotorId, percent: u8) -> Result<(), MotorError> {
        (**self).set_duty_cycle(motor, percent)
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The two drive motors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorId {
    /// Motor A on the driver board
    Left,

    /// Motor B on the driver board
    Right,
}

/// Electrical rotation direction of a motor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Forward,
    Backward,
}

/// A single write to the motor driver, used for recording what was sent.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Direction(MotorId, Rotation),
    DutyCycle(MotorId, u8),
}

#[derive(thiserror::Error, Debug)]
pub enum MotorError {
    #[error("An I2C error occured: {0}")]
    I2c(String),

    #[error("Duty cycle must be between 0 and 100 %, got {0}")]
    InvalidDutyCycle(u8),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Rotation {
    /// The opposite rotation.
    pub fn reversed(self) -> Self {
        match self {
            Rotation::Forward => Rotation::Backward,
            Rotation::Backward => Rotation::Forward,
        }
    }
}
