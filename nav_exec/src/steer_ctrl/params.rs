//! Parameters structure for SteerCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for steering control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {

    // ---- HYSTERESIS ----

    /// Number of consecutive identical requests, after the first, before a command is issued.
    pub confidence_threshold: u8,

    // ---- TURNS ----

    /// Change in wheel speed applied by each turn command.
    ///
    /// Units: percent
    pub turn_delta: u8,

    /// Ramp step used by turn commands.
    ///
    /// Units: percent
    pub turn_ramp_step: u8,

    // ---- STRAIGHT ----

    /// Speed of both wheels when driving straight.
    ///
    /// Units: percent
    pub straight_speed: u8,

    /// Ramp step used by straight commands.
    ///
    /// Units: percent
    pub straight_ramp_step: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            confidence_threshold: 8,
            turn_delta: 5,
            turn_ramp_step: 1,
            straight_speed: 100,
            straight_ramp_step: 5,
        }
    }
}
