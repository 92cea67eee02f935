//! Parameters structure for ObstAvoid

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for obstacle avoidance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {

    // ---- DETECTION ----

    /// An object closer than this to the front sensor triggers the manouvre.
    ///
    /// Units: centimeters
    pub front_max_distance_cm: f32,

    /// An object closer than this to the side sensor is alongside the robot.
    ///
    /// Units: centimeters
    pub side_max_distance_cm: f32,

    // ---- SIDE TRACKING ----

    /// Number of times each side tracking phase is repeated.
    pub attempts: u32,

    /// Confidence the side reading must reach before a tracking attempt ends.
    pub confidence_threshold: u8,

    /// Period between two side sensor polls.
    ///
    /// Units: seconds
    pub poll_period_s: f64,

    // ---- TURNS ----

    /// Time a left pivot is held for to turn 90 degrees.
    ///
    /// Units: seconds
    pub turn_left_s: f64,

    /// Time a right pivot is held for to turn 90 degrees.
    ///
    /// Units: seconds
    pub turn_right_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            front_max_distance_cm: 30.0,
            side_max_distance_cm: 40.0,
            attempts: 3,
            confidence_threshold: 50,
            poll_period_s: 0.01,
            turn_left_s: 1.1,
            turn_right_s: 1.0,
        }
    }
}
