//! Running confidence over range measurements

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use super::{Params, RangeError, RangeReading, MAX_CONFIDENCE};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Smooths raw measurements into a [`RangeReading`].
///
/// Readings which agree with the previous one build confidence one step at a time, a jump in
/// distance costs as much confidence as the size of the jump, and runs of timeouts cost more the
/// longer they last.
#[derive(Debug, Clone)]
pub struct RangeFilter {
    last_distance_cm: f32,
    confidence: u8,
    bad_readings: u8,
    delta_weight: f32,
    delta_threshold: f32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RangeFilter {
    pub fn new(params: &Params) -> Self {
        Self {
            last_distance_cm: 0.0,
            confidence: params.initial_confidence.min(MAX_CONFIDENCE),
            bad_readings: 0,
            delta_weight: params.delta_weight,
            delta_threshold: params.delta_threshold,
        }
    }

    /// The current filtered reading.
    pub fn reading(&self) -> RangeReading {
        RangeReading {
            distance_cm: self.last_distance_cm,
            confidence: self.confidence,
        }
    }

    /// Consume the result of one measurement.
    ///
    /// An aborted measurement is neither good nor bad and leaves the filter untouched.
    pub fn update(&mut self, measurement: Result<f32, RangeError>) -> RangeReading {
        match measurement {
            Ok(distance_cm) => {
                // Whole centimeters only
                let jump_cm = (distance_cm - self.last_distance_cm).abs().trunc();
                let delta = jump_cm * self.delta_weight;

                if delta < self.delta_threshold {
                    self.confidence = (self.confidence + 1).min(MAX_CONFIDENCE);
                } else {
                    self.confidence = sub_floor(self.confidence, delta);
                }

                self.last_distance_cm = distance_cm;
                self.bad_readings = 0;
            }
            Err(RangeError::Timeout) => {
                self.bad_readings = (self.bad_readings + 1).min(MAX_CONFIDENCE);
                self.confidence = sub_floor(
                    self.confidence,
                    self.bad_readings as f32 * self.delta_weight,
                );
            }
            Err(RangeError::Aborted) => (),
        }

        trace!(
            "Range filter: {:.1} cm at {} (bad readings: {})",
            self.last_distance_cm,
            self.confidence,
            self.bad_readings
        );

        self.reading()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Subtract a non-negative amount from a confidence, stopping at zero.
///
/// The amount is truncated to a whole number before it is subtracted.
fn sub_floor(confidence: u8, amount: f32) -> u8 {
    let c = confidence as f32 - amount.max(0.0).trunc();

    if c <= 0.0 {
        0
    } else {
        c as u8
    }
}
