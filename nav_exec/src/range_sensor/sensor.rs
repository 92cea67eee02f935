//! Ultrasonic sensor driver and worker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, trace};

use hw_if::{Clock, DigitalInput, DigitalOutput};

use super::{distance_cm, Params, RangeError, RangeFilter};
use crate::shared::RangeCell;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One ultrasonic transducer.
pub struct RangeSensor<T, E, C> {
    trigger: T,
    echo: E,
    clock: C,
    params: Params,
    terminate: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T, E, C> RangeSensor<T, E, C>
where
    T: DigitalOutput,
    E: DigitalInput,
    C: Clock,
{
    pub fn new(trigger: T, echo: E, clock: C, params: Params, terminate: Arc<AtomicBool>) -> Self {
        Self {
            trigger,
            echo,
            clock,
            params,
            terminate,
        }
    }

    /// Ping once and time the echo.
    ///
    /// Returns the distance in centimeters, [`RangeError::Timeout`] if the echo does not rise or
    /// does not fall in time, or [`RangeError::Aborted`] if shutdown was requested while waiting.
    pub fn measure_once(&mut self) -> Result<f32, RangeError> {
        let timeout_ns = self.params.echo_timeout_ns();

        // Trigger pulse
        self.trigger.write(true);
        let pulse_start = self.clock.now_ns();
        let pulse_ns = self.params.trigger_pulse_us * 1000;
        while self.clock.now_ns().saturating_sub(pulse_start) < pulse_ns {
            std::hint::spin_loop();
        }
        self.trigger.write(false);

        // Wait for the echo to rise
        self.wait_for_echo(true, self.clock.now_ns(), timeout_ns)?;

        // Time the echo
        let echo_start = self.clock.now_ns();
        let echo_end = self.wait_for_echo(false, echo_start, timeout_ns)?;

        Ok(distance_cm(
            echo_end.saturating_sub(echo_start),
            self.params.v_sound_m_s,
        ))
    }

    /// Poll the echo line until it reaches `level`, returning the time it did.
    fn wait_for_echo(&self, level: bool, start_ns: u64, timeout_ns: u64) -> Result<u64, RangeError> {
        loop {
            if self.terminate.load(Ordering::Relaxed) {
                return Err(RangeError::Aborted);
            }

            let now = self.clock.now_ns();
            if self.echo.read() == level {
                return Ok(now);
            }

            if now.saturating_sub(start_ns) > timeout_ns {
                return Err(RangeError::Timeout);
            }

            thread::yield_now();
        }
    }
}

impl<T, E, C> RangeSensor<T, E, C>
where
    T: DigitalOutput + Send + 'static,
    E: DigitalInput + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Start the worker thread for this sensor.
    ///
    /// The worker pings at the configured rate and publishes every filtered reading into `cell`
    /// until the termination flag is raised.
    pub fn spawn(mut self, name: &str, cell: Arc<RangeCell>) -> std::io::Result<JoinHandle<()>> {
        let name = name.to_string();

        thread::Builder::new().name(name.clone()).spawn(move || {
            let mut filter = RangeFilter::new(&self.params);
            let period = Duration::from_millis(self.params.ping_period_ms);

            cell.store(filter.reading());
            info!("{} worker started", name);

            while !self.terminate.load(Ordering::Relaxed) {
                let measurement = self.measure_once();
                if let Err(RangeError::Timeout) = measurement {
                    trace!("{}: echo timed out", name);
                }

                cell.store(filter.update(measurement));

                thread::sleep(period);
            }

            info!("{} worker stopped", name);
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hw_if::sim::{SimClock, SimSonar, SimSonarEcho, SimSonarTrigger};

    fn sensor(
        distance_cm: Option<f32>,
    ) -> (
        RangeSensor<SimSonarTrigger, SimSonarEcho, SimClock>,
        Arc<AtomicBool>,
    ) {
        let clock = SimClock::new(500);
        let sonar = SimSonar::new(Arc::new(clock.clone()), 200_000);
        sonar.set_distance_cm(distance_cm);
        let terminate = Arc::new(AtomicBool::new(false));

        (
            RangeSensor::new(
                sonar.trigger(),
                sonar.echo(),
                clock,
                Params::default(),
                terminate.clone(),
            ),
            terminate,
        )
    }

    #[test]
    fn test_measure_once() {
        let (mut s, _) = sensor(Some(34.3));
        let d = s.measure_once().unwrap();
        assert!((d - 34.3).abs() < 0.5, "measured {} cm", d);

        let (mut s, _) = sensor(Some(150.0));
        let d = s.measure_once().unwrap();
        assert!((d - 150.0).abs() < 0.5, "measured {} cm", d);
    }

    #[test]
    fn test_no_echo_times_out() {
        let (mut s, _) = sensor(None);
        assert_eq!(s.measure_once(), Err(RangeError::Timeout));
    }

    #[test]
    fn test_echo_too_long_times_out() {
        // Beyond twice the maximum range the echo outlasts the timeout
        let (mut s, _) = sensor(Some(700.0));
        assert_eq!(s.measure_once(), Err(RangeError::Timeout));
    }

    #[test]
    fn test_terminate_aborts() {
        let (mut s, terminate) = sensor(None);
        terminate.store(true, Ordering::Relaxed);
        assert_eq!(s.measure_once(), Err(RangeError::Aborted));
    }

    #[test]
    fn test_worker_publishes() {
        let (s, terminate) = sensor(Some(20.0));
        let cell = Arc::new(RangeCell::default());

        let handle = s.spawn("test_sonar", cell.clone()).unwrap();
        thread::sleep(Duration::from_millis(200));
        terminate.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let r = cell.load();
        assert!((r.distance_cm - 20.0).abs() < 0.5);
        assert!(r.confidence > 0);
    }
}
