//! # Shared sensor state
//!
//! Every published sensor value lives in its own lock-free cell. Each cell has exactly one writer
//! (the worker owning the sensor) and is read by the control loop. A cell always holds a whole
//! value, there is no ordering between different cells.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use crate::{line_array::LineSnapshot, obst_avoid::AvoidSensors, range_sensor::RangeReading};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A [`RangeReading`] packed into a single atomic word.
///
/// The distance bits sit in the upper half and the confidence in the lowest byte.
#[derive(Debug)]
pub struct RangeCell(AtomicU64);

/// A wheel speed stored as the bits of an `f64`.
#[derive(Debug)]
pub struct SpeedCell(AtomicU64);

/// One flag per line sensor position.
#[derive(Debug, Clone)]
pub struct LineCells {
    /// Front left, front centre, front right.
    pub inner: [Arc<AtomicBool>; 3],

    /// Outer left, outer right, if fitted.
    pub outer: Option<[Arc<AtomicBool>; 2]>,
}

/// All sensor state shared between the workers and the control loop.
#[derive(Debug, Clone)]
pub struct SharedState {
    pub front_range: Arc<RangeCell>,
    pub side_range: Arc<RangeCell>,
    pub left_speed: Arc<SpeedCell>,
    pub right_speed: Arc<SpeedCell>,
    pub line: LineCells,

    /// Raised once to stop every worker and the control loop.
    pub terminate: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RangeCell {
    pub fn new(reading: RangeReading) -> Self {
        Self(AtomicU64::new(pack_range(reading)))
    }

    pub fn store(&self, reading: RangeReading) {
        self.0.store(pack_range(reading), Ordering::Relaxed)
    }

    pub fn load(&self) -> RangeReading {
        unpack_range(self.0.load(Ordering::Relaxed))
    }
}

impl Default for RangeCell {
    fn default() -> Self {
        Self::new(RangeReading::default())
    }
}

impl SpeedCell {
    pub fn new(speed: f64) -> Self {
        Self(AtomicU64::new(speed.to_bits()))
    }

    pub fn store(&self, speed: f64) {
        self.0.store(speed.to_bits(), Ordering::Relaxed)
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Default for SpeedCell {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl LineCells {
    /// Create cells for the three front sensors, plus the two outer ones if `with_outer` is set.
    pub fn new(with_outer: bool) -> Self {
        let cell = || Arc::new(AtomicBool::new(false));

        Self {
            inner: [cell(), cell(), cell()],
            outer: match with_outer {
                true => Some([cell(), cell()]),
                false => None,
            },
        }
    }

    pub fn snapshot(&self) -> LineSnapshot {
        let get = |c: &Arc<AtomicBool>| c.load(Ordering::Relaxed);

        LineSnapshot {
            inner: [get(&self.inner[0]), get(&self.inner[1]), get(&self.inner[2])],
            outer: self.outer.as_ref().map(|o| [get(&o[0]), get(&o[1])]),
        }
    }
}

impl SharedState {
    pub fn new(with_outer: bool, initial_range: RangeReading, terminate: Arc<AtomicBool>) -> Self {
        Self {
            front_range: Arc::new(RangeCell::new(initial_range)),
            side_range: Arc::new(RangeCell::new(initial_range)),
            left_speed: Arc::new(SpeedCell::default()),
            right_speed: Arc::new(SpeedCell::default()),
            line: LineCells::new(with_outer),
            terminate,
        }
    }

    pub fn terminated(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }
}

impl AvoidSensors for SharedState {
    fn side_reading(&self) -> RangeReading {
        self.side_range.load()
    }

    fn line_snapshot(&self) -> LineSnapshot {
        self.line.snapshot()
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn pack_range(reading: RangeReading) -> u64 {
    ((reading.distance_cm.to_bits() as u64) << 32) | reading.confidence as u64
}

fn unpack_range(word: u64) -> RangeReading {
    RangeReading {
        distance_cm: f32::from_bits((word >> 32) as u32),
        confidence: (word & 0xff) as u8,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_range_cell() {
        let cell = RangeCell::default();
        assert_eq!(cell.load(), RangeReading::default());

        let r = RangeReading {
            distance_cm: 123.25,
            confidence: 100,
        };
        cell.store(r);
        assert_eq!(cell.load(), r);
    }

    #[test]
    fn test_speed_cell() {
        let cell = SpeedCell::default();
        cell.store(-40.84);
        assert_eq!(cell.load(), -40.84);
    }

    #[test]
    fn test_line_snapshot() {
        let cells = LineCells::new(true);
        cells.inner[1].store(true, Ordering::Relaxed);
        cells.outer.as_ref().unwrap()[0].store(true, Ordering::Relaxed);

        let snap = cells.snapshot();
        assert_eq!(snap.inner, [false, true, false]);
        assert_eq!(snap.outer, Some([true, false]));
        assert_eq!(snap.active_count(), 2);

        assert_eq!(LineCells::new(false).snapshot().outer, None);
    }
}
