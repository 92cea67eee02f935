//! # Line array
//!
//! Each line sensor pin gets its own worker which polls the pin and publishes whether the sensor
//! currently sees the line.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use hw_if::DigitalInput;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the line sensors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// If true a sensor sees the line when its pin reads HIGH.
    pub active_high: bool,

    /// Period between two reads of a pin.
    ///
    /// Units: microseconds
    pub poll_period_us: u64,
}

/// The state of every line sensor at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineSnapshot {
    /// Front left, front centre, front right.
    pub inner: [bool; 3],

    /// Outer left, outer right, if fitted.
    pub outer: Option<[bool; 2]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            active_high: true,
            poll_period_us: 50,
        }
    }
}

impl LineSnapshot {
    /// Snapshot of a three sensor array.
    pub fn inner(left: bool, centre: bool, right: bool) -> Self {
        Self {
            inner: [left, centre, right],
            outer: None,
        }
    }

    /// Number of sensors currently on the line.
    pub fn active_count(&self) -> usize {
        let outer = self.outer.unwrap_or([false; 2]);
        self.inner.iter().chain(outer.iter()).filter(|&&a| a).count()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Start the worker thread for one line sensor pin.
pub fn spawn_pin_worker<P>(
    name: &str,
    pin: P,
    cell: Arc<AtomicBool>,
    params: &Params,
    terminate: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>>
where
    P: DigitalInput + Send + 'static,
{
    let name = name.to_string();
    let active_high = params.active_high;
    let period = Duration::from_micros(params.poll_period_us);

    thread::Builder::new().name(name.clone()).spawn(move || {
        info!("{} worker started", name);

        while !terminate.load(Ordering::Relaxed) {
            cell.store(pin.read() == active_high, Ordering::Relaxed);
            thread::sleep(period);
        }

        info!("{} worker stopped", name);
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use hw_if::sim::SimPin;

    #[test]
    fn test_active_count() {
        assert_eq!(LineSnapshot::default().active_count(), 0);
        assert_eq!(LineSnapshot::inner(true, true, false).active_count(), 2);

        let s = LineSnapshot {
            inner: [false, true, false],
            outer: Some([true, true]),
        };
        assert_eq!(s.active_count(), 3);
    }

    #[test]
    fn test_pin_worker_polarity() {
        for &active_high in &[true, false] {
            let pin = SimPin::new(false);
            let cell = Arc::new(AtomicBool::new(false));
            let terminate = Arc::new(AtomicBool::new(false));
            let params = Params {
                active_high,
                ..Params::default()
            };

            let handle =
                spawn_pin_worker("test_line", pin.clone(), cell.clone(), &params, terminate.clone())
                    .unwrap();

            thread::sleep(Duration::from_millis(20));
            assert_eq!(cell.load(Ordering::Relaxed), !active_high);

            pin.set(true);
            thread::sleep(Duration::from_millis(20));
            assert_eq!(cell.load(Ordering::Relaxed), active_high);

            terminate.store(true, Ordering::Relaxed);
            handle.join().unwrap();
        }
    }
}
