//! Parameters structure for the encoder channels

use serde::{Deserialize, Serialize};

/// Parameters for the wheel encoders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// Encoder pulses per wheel revolution, before quadrature decoding.
    pub pulses_per_rev: f64,

    /// Radius of the wheels.
    ///
    /// Units: centimeters
    pub wheel_radius_cm: f64,

    /// Time between clearing the counter and reading it.
    ///
    /// Units: milliseconds
    pub window_ms: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            pulses_per_rev: 540.0,
            wheel_radius_cm: 6.5,
            window_ms: 10,
        }
    }
}
