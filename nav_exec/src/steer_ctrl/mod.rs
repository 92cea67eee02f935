//! Steering control module
//!
//! Follows the line. Each cycle the line sensors are turned into a direction request, and a
//! request only reaches the motors once it has been made enough times in a row. The inner
//! (front) sensors and the outer (side) sensors keep separate confidence counters.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// Internal
pub use params::*;
pub use state::*;
use crate::drive::RampError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Directions the robot can be steered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Straight,
    Left,
    Right,
    Forward,
    Backward,
}

/// Which component owns the motor command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Line,
    Obstacle,
}

/// Sensor group a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    Inner,
    Outer,
}

/// Outcome of evaluating one line snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Keep doing whatever the motors are doing, no counters change.
    Hold,

    /// Ask for a direction against the given axis' counter.
    Request(Direction, Axis),
}

/// Possible errors that can occur during SteerCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SteerCtrlError {
    #[error("Invalid steering parameters: {0}")]
    InvalidParams(String),

    #[error("Could not apply the {direction:?} command: {source}")]
    Drive {
        direction: Direction,
        source: RampError,
    },
}
