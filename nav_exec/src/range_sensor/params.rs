//! Parameters structure for the range sensors

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the ultrasonic range sensors.
///
/// Both the front and side sensors share one set of parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {

    // ---- PHYSICS ----

    /// Speed of sound in air.
    ///
    /// Units: meters/second
    pub v_sound_m_s: f64,

    // ---- SENSOR ----

    /// Maximum valid range of the sensor. Sets the echo timeout.
    ///
    /// Units: meters
    pub max_range_m: f64,

    /// Width of the trigger pulse.
    ///
    /// Units: microseconds
    pub trigger_pulse_us: u64,

    /// Period between two pings.
    ///
    /// Units: milliseconds
    pub ping_period_ms: u64,

    // ---- CONFIDENCE ----

    /// Weight applied to the change between two readings, and to the number of consecutive bad
    /// readings, before it is taken off the confidence.
    pub delta_weight: f32,

    /// Weighted change between two readings below which they are considered to agree.
    ///
    /// Units: centimeters
    pub delta_threshold: f32,

    /// Confidence the sensor starts with.
    pub initial_confidence: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            v_sound_m_s: 343.0,
            max_range_m: 3.0,
            trigger_pulse_us: 10,
            ping_period_ms: 50,
            delta_weight: 1.0,
            delta_threshold: 5.0,
            initial_confidence: 100,
        }
    }
}

impl Params {
    /// Time for sound to travel to a target at maximum range and back.
    pub fn echo_timeout_ns(&self) -> u64 {
        (2.0 * self.max_range_m / self.v_sound_m_s * 1e9) as u64
    }
}
