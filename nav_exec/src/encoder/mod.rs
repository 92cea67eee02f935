//! Encoder channel module
//!
//! Wheel speed from a hardware quadrature counter. Each poll clears the counter, lets it count for
//! a fixed window, and reads it back. The count over the window gives the wheel speed directly,
//! there is no filtering.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::PI;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, trace, warn};

use hw_if::{ChipSelect, EncoderTransport, TransportError};

pub use params::*;
use crate::shared::SpeedCell;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Counts per encoder pulse with 4x quadrature decoding.
pub const QUADRATURE_FACTOR: f64 = 4.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One wheel encoder.
pub struct EncoderChannel<T> {
    transport: T,
    chip_select: ChipSelect,
    params: Params,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("Could not clear the counter: {0}")]
    Clear(TransportError),

    #[error("Could not read the counter: {0}")]
    Read(TransportError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: EncoderTransport> EncoderChannel<T> {
    pub fn new(transport: T, chip_select: ChipSelect, params: Params) -> Self {
        Self {
            transport,
            chip_select,
            params,
        }
    }

    /// Measure the wheel speed over one window.
    ///
    /// Units: centimeters/second
    pub fn poll_once(&mut self) -> Result<f64, EncoderError> {
        self.transport
            .clear_counter(self.chip_select)
            .map_err(EncoderError::Clear)?;

        thread::sleep(Duration::from_millis(self.params.window_ms));

        let ticks = self
            .transport
            .read_counter(self.chip_select)
            .map_err(EncoderError::Read)?;

        let speed = linear_speed(ticks, &self.params);
        trace!("{:?}: {} ticks, {:.2} cm/s", self.chip_select, ticks, speed);

        Ok(speed)
    }
}

impl<T: EncoderTransport + Send + 'static> EncoderChannel<T> {
    /// Start the worker thread for this channel.
    ///
    /// A failed poll leaves the previous speed in `cell`.
    pub fn spawn(
        mut self,
        name: &str,
        cell: Arc<SpeedCell>,
        terminate: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        let name = name.to_string();

        thread::Builder::new().name(name.clone()).spawn(move || {
            info!("{} worker started", name);

            while !terminate.load(Ordering::Relaxed) {
                match self.poll_once() {
                    Ok(speed) => cell.store(speed),
                    Err(e) => {
                        warn!("{}: {}", name, e);
                        thread::sleep(Duration::from_millis(self.params.window_ms));
                    }
                }
            }

            info!("{} worker stopped", name);
        })
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Wheel revolutions per second given the ticks counted over one window.
pub fn revs_per_sec(ticks: i32, params: &Params) -> f64 {
    let windows_per_sec = 1000.0 / params.window_ms.max(1) as f64;

    windows_per_sec * ticks as f64 / (QUADRATURE_FACTOR * params.pulses_per_rev)
}

/// Linear wheel speed given the ticks counted over one window.
///
/// Units: centimeters/second
pub fn linear_speed(ticks: i32, params: &Params) -> f64 {
    revs_per_sec(ticks, params) * 2.0 * PI * params.wheel_radius_cm
}

#[cfg(test)]
mod test {
    use super::*;
    use hw_if::sim::{EncoderOp, SimEncoder};

    #[test]
    fn test_one_rev_per_window() {
        let p = Params::default();
        let ticks = (4.0 * p.pulses_per_rev) as i32;

        assert!((revs_per_sec(ticks, &p) - 100.0).abs() < 1e-9);
        assert!((linear_speed(ticks, &p) - 100.0 * 2.0 * PI * 6.5).abs() < 1e-6);
        assert!((linear_speed(-ticks, &p) + 100.0 * 2.0 * PI * 6.5).abs() < 1e-6);
        assert_eq!(linear_speed(0, &p), 0.0);
    }

    #[test]
    fn test_poll_order() {
        let enc = SimEncoder::new(2160);
        let mut chan = EncoderChannel::new(enc.clone(), ChipSelect::Ce1, Params::default());

        let speed = chan.poll_once().unwrap();
        assert!((speed - 4084.07).abs() < 0.01);
        assert_eq!(
            enc.ops(),
            vec![EncoderOp::Clear(ChipSelect::Ce1), EncoderOp::Read(ChipSelect::Ce1)]
        );
    }

    #[test]
    fn test_fault_keeps_last_speed() {
        let enc = SimEncoder::new(540);
        let terminate = Arc::new(AtomicBool::new(false));
        let cell = Arc::new(SpeedCell::default());
        let chan = EncoderChannel::new(enc.clone(), ChipSelect::Ce0, Params::default());

        let handle = chan.spawn("test_enc", cell.clone(), terminate.clone()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let good = cell.load();
        assert!((good - linear_speed(540, &Params::default())).abs() < 1e-9);

        enc.set_fail(true);
        enc.set_ticks(0);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cell.load(), good);

        terminate.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
