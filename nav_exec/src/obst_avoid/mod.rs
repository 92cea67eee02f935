//! Obstacle avoidance module
//!
//! Drives around an obstacle in a rectangle: turn right and drive past it, turn left and drive
//! along it until its trailing edge is passed, turn left again and drive back to the line, then
//! turn right to rejoin it.
//!
//! The sequencer blocks the control loop while it runs. Every wait inside it watches the
//! termination flag.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod sequencer;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// Internal
pub use params::*;
pub use sequencer::*;
use crate::{line_array::LineSnapshot, range_sensor::RangeReading};
use hw_if::MotorError;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Sensor data the sequencer needs while it runs.
pub trait AvoidSensors {
    /// Latest reading of the side facing range sensor.
    fn side_reading(&self) -> RangeReading;

    /// Latest state of the line sensors.
    fn line_snapshot(&self) -> LineSnapshot;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a manouvre ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AvoidOutcome {
    /// The line was found again and control can go back to steering.
    Completed,

    /// Shutdown was requested part way through.
    Terminated,
}

/// Phases of the manouvre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    TurnAway,
    Pass,
    TurnAlong,
    Redetect,
    Clear,
    TurnBack,
    LineSearch,
    Rejoin,
}

/// Possible errors that can occur during ObstAvoid operation.
#[derive(Debug, thiserror::Error)]
pub enum ObstAvoidError {
    #[error("Motor fault during the {phase:?} phase: {source}")]
    Motor { phase: Phase, source: MotorError },
}
