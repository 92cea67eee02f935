//! Range sensor module
//!
//! Ultrasonic ranging. A ping is triggered, the echo pulse is timed, and the resulting distance is
//! fed into a [`RangeFilter`] which keeps a running confidence in the readings. The filtered
//! [`RangeReading`] is what gets published to the control loop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod filter;
mod params;
mod sensor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// Internal
pub use filter::*;
pub use params::*;
pub use sensor::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum value of any confidence counter.
pub const MAX_CONFIDENCE: u8 = 100;

/// Minimum confidence a reading must have for an object to be considered present.
pub const OBJECT_CONFIDENCE_THRESHOLD: u8 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A filtered range reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeReading {
    /// Last valid distance measured.
    ///
    /// Units: centimeters
    pub distance_cm: f32,

    /// Confidence in the distance, between 0 and 100.
    pub confidence: u8,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a single measurement did not produce a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("No echo within the timeout")]
    Timeout,

    #[error("Measurement abandoned on shutdown")]
    Aborted,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Distance to a target given the width of its echo pulse.
///
/// Units: meters
pub fn distance_m(echo_ns: u64, v_sound_m_s: f64) -> f64 {
    // Half the round trip
    0.5 * v_sound_m_s * 1e-9 * echo_ns as f64
}

/// Distance to a target given the width of its echo pulse.
///
/// Units: centimeters
pub fn distance_cm(echo_ns: u64, v_sound_m_s: f64) -> f32 {
    (distance_m(echo_ns, v_sound_m_s) * 100.0) as f32
}

/// Whether the reading shows an object within `max_distance_cm` with enough confidence.
pub fn object_present(reading: RangeReading, max_distance_cm: f32) -> bool {
    reading.distance_cm > 0.0
        && reading.distance_cm <= max_distance_cm
        && reading.confidence >= OBJECT_CONFIDENCE_THRESHOLD
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_distance() {
        assert!((distance_cm(2_000_000, 343.0) - 34.3).abs() < 1e-3);
        assert!((distance_m(2_000_000, 343.0) - 0.343).abs() < 1e-9);
        assert_eq!(distance_cm(0, 343.0), 0.0);
    }

    #[test]
    fn test_object_present() {
        let r = |d, c| RangeReading {
            distance_cm: d,
            confidence: c,
        };

        assert!(object_present(r(20.0, 50), 30.0));
        assert!(object_present(r(30.0, 5), 30.0));
        assert!(!object_present(r(30.1, 100), 30.0));
        assert!(!object_present(r(20.0, 4), 30.0));
        assert!(!object_present(r(0.0, 100), 30.0));
    }

    #[test]
    fn test_echo_timeout() {
        let p = Params::default();

        // 6 m round trip at 343 m/s
        assert_eq!(p.echo_timeout_ns(), 17_492_711);
    }
}
