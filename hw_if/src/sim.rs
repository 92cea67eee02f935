//! # Simulated equipment
//!
//! Software stand-ins for every equipment interface. They are used by the unit tests and by the
//! `--sim` mode of the executable, which runs the full control software on a development host.
//!
//! Every simulated item is a cheap handle onto shared state, so a test can keep a clone to drive
//! or inspect the item after handing the original to a worker.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering},
    Arc, Mutex,
};

use crate::eqpt::{
    ChipSelect, Clock, DigitalInput, DigitalOutput, EncoderTransport, MotorActuator,
    MotorCommand, MotorError, MotorId, Rotation, TransportError,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of commands or operations kept by the recording items.
const HISTORY_LEN: usize = 4096;

/// Speed of sound used by the simulated ultrasonic sensor.
const SIM_VSOUND_M_S: f64 = 343.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A manually driven clock which also advances by a fixed step every time it is read.
///
/// The auto step lets busy-polling code make progress without real time passing.
#[derive(Debug, Clone)]
pub struct SimClock {
    now_ns: Arc<AtomicU64>,
    step_ns: u64,
}

/// A pin whose level is set from software. Acts as both an input and an output.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

/// A simulated ultrasonic sensor.
///
/// A falling edge on the trigger schedules an echo pulse whose width matches the configured
/// distance. With no distance set the echo never rises.
#[derive(Clone)]
pub struct SimSonar {
    state: Arc<SonarState>,
}

/// Trigger line of a [`SimSonar`].
pub struct SimSonarTrigger {
    state: Arc<SonarState>,
    level: bool,
}

/// Echo line of a [`SimSonar`].
pub struct SimSonarEcho {
    state: Arc<SonarState>,
}

struct SonarState {
    clock: Arc<dyn Clock + Send + Sync>,
    echo_delay_ns: u64,
    distance_um: AtomicU64,
    has_target: AtomicBool,
    triggered_at_ns: AtomicU64,
    triggered: AtomicBool,
}

/// A simulated quadrature counter which reports a fixed number of ticks per read.
#[derive(Clone, Default)]
pub struct SimEncoder {
    state: Arc<EncoderState>,
}

#[derive(Default)]
struct EncoderState {
    ticks: AtomicI32,
    fail: AtomicBool,
    ops: Mutex<VecDeque<EncoderOp>>,
}

/// Operations seen by a [`SimEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderOp {
    Clear(ChipSelect),
    Read(ChipSelect),
}

/// A motor driver which records every command it is sent.
#[derive(Clone, Default)]
pub struct SimMotors {
    state: Arc<Mutex<MotorsState>>,
    fail: Arc<AtomicBool>,
}

#[derive(Default)]
struct MotorsState {
    history: VecDeque<MotorCommand>,
    left: (Option<Rotation>, u8),
    right: (Option<Rotation>, u8),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimClock {
    /// Create a clock at time zero which advances `step_ns` on each read.
    pub fn new(step_ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
            step_ns,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ns: u64) {
        self.now_ns.fetch_add(ns, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.fetch_add(self.step_ns, Ordering::SeqCst)
    }
}

impl SimPin {
    pub fn new(level: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(level)),
        }
    }

    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::SeqCst)
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

impl DigitalInput for SimPin {
    fn read(&self) -> bool {
        self.get()
    }
}

impl DigitalOutput for SimPin {
    fn write(&mut self, level: bool) {
        self.set(level)
    }
}

impl SimSonar {
    /// Create a sensor timed against `clock` whose echo rises `echo_delay_ns` after the trigger.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, echo_delay_ns: u64) -> Self {
        Self {
            state: Arc::new(SonarState {
                clock,
                echo_delay_ns,
                distance_um: AtomicU64::new(0),
                has_target: AtomicBool::new(false),
                triggered_at_ns: AtomicU64::new(0),
                triggered: AtomicBool::new(false),
            }),
        }
    }

    /// Set the distance to the target, or `None` for no echo at all.
    pub fn set_distance_cm(&self, distance_cm: Option<f32>) {
        match distance_cm {
            Some(d) => {
                self.state
                    .distance_um
                    .store((d.max(0.0) as f64 * 1e4) as u64, Ordering::SeqCst);
                self.state.has_target.store(true, Ordering::SeqCst);
            }
            None => self.state.has_target.store(false, Ordering::SeqCst),
        }
    }

    pub fn trigger(&self) -> SimSonarTrigger {
        SimSonarTrigger {
            state: self.state.clone(),
            level: false,
        }
    }

    pub fn echo(&self) -> SimSonarEcho {
        SimSonarEcho {
            state: self.state.clone(),
        }
    }
}

impl SonarState {
    /// Width of the echo pulse for the current target, in nanoseconds.
    fn pulse_ns(&self) -> u64 {
        let distance_m = self.distance_um.load(Ordering::SeqCst) as f64 * 1e-6;
        (2.0 * distance_m / SIM_VSOUND_M_S * 1e9) as u64
    }
}

impl DigitalOutput for SimSonarTrigger {
    fn write(&mut self, level: bool) {
        // The sensor fires on the falling edge of the trigger pulse
        if self.level && !level {
            let now = self.state.clock.now_ns();
            self.state.triggered_at_ns.store(now, Ordering::SeqCst);
            self.state.triggered.store(true, Ordering::SeqCst);
        }
        self.level = level;
    }
}

impl DigitalInput for SimSonarEcho {
    fn read(&self) -> bool {
        let s = &self.state;

        if !s.triggered.load(Ordering::SeqCst) || !s.has_target.load(Ordering::SeqCst) {
            return false;
        }

        let rise = s.triggered_at_ns.load(Ordering::SeqCst) + s.echo_delay_ns;
        let fall = rise + s.pulse_ns();
        let now = s.clock.now_ns();

        now >= rise && now < fall
    }
}

impl SimEncoder {
    pub fn new(ticks: i32) -> Self {
        let e = Self::default();
        e.set_ticks(ticks);
        e
    }

    /// Set the count returned by every following read.
    pub fn set_ticks(&self, ticks: i32) {
        self.state.ticks.store(ticks, Ordering::SeqCst)
    }

    /// Make every following transfer fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst)
    }

    /// The most recent operations, oldest first.
    pub fn ops(&self) -> Vec<EncoderOp> {
        match self.state.ops.lock() {
            Ok(ops) => ops.iter().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn record(&self, op: EncoderOp) {
        if let Ok(mut ops) = self.state.ops.lock() {
            if ops.len() == HISTORY_LEN {
                ops.pop_front();
            }
            ops.push_back(op);
        }
    }
}

impl EncoderTransport for SimEncoder {
    fn clear_counter(&mut self, chip_select: ChipSelect) -> Result<(), TransportError> {
        self.record(EncoderOp::Clear(chip_select));
        match self.state.fail.load(Ordering::SeqCst) {
            true => Err(TransportError::Simulated),
            false => Ok(()),
        }
    }

    fn read_counter(&mut self, chip_select: ChipSelect) -> Result<i32, TransportError> {
        self.record(EncoderOp::Read(chip_select));
        let ticks = self.state.ticks.load(Ordering::SeqCst);
        match self.state.fail.load(Ordering::SeqCst) {
            true => Err(TransportError::Simulated),
            false => Ok(ticks),
        }
    }
}

impl SimMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst)
    }

    /// Commands received so far, oldest first.
    pub fn history(&self) -> Vec<MotorCommand> {
        match self.state.lock() {
            Ok(s) => s.history.iter().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_history(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.history.clear();
        }
    }

    /// Last direction and duty cycle set for the motor.
    pub fn motor(&self, motor: MotorId) -> (Option<Rotation>, u8) {
        match self.state.lock() {
            Ok(s) => match motor {
                MotorId::Left => s.left,
                MotorId::Right => s.right,
            },
            Err(_) => (None, 0),
        }
    }

    fn apply(&mut self, cmd: MotorCommand) -> Result<(), MotorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MotorError::I2c("simulated bus fault".into()));
        }

        let mut s = self
            .state
            .lock()
            .map_err(|_| MotorError::I2c("simulated driver poisoned".into()))?;

        match cmd {
            MotorCommand::Direction(MotorId::Left, r) => s.left.0 = Some(r),
            MotorCommand::Direction(MotorId::Right, r) => s.right.0 = Some(r),
            MotorCommand::DutyCycle(MotorId::Left, d) => s.left.1 = d,
            MotorCommand::DutyCycle(MotorId::Right, d) => s.right.1 = d,
        }

        if s.history.len() == HISTORY_LEN {
            s.history.pop_front();
        }
        s.history.push_back(cmd);

        Ok(())
    }
}

impl MotorActuator for SimMotors {
    fn set_direction(&mut self, motor: MotorId, rotation: Rotation) -> Result<(), MotorError> {
        self.apply(MotorCommand::Direction(motor, rotation))
    }

    fn set_duty_cycle(&mut self, motor: MotorId, percent: u8) -> Result<(), MotorError> {
        if percent > 100 {
            return Err(MotorError::InvalidDutyCycle(percent));
        }
        self.apply(MotorCommand::DutyCycle(motor, percent))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sonar_echo_window() {
        let clock = SimClock::new(0);
        let sonar = SimSonar::new(Arc::new(clock.clone()), 1_000);
        sonar.set_distance_cm(Some(34.3));

        let mut trig = sonar.trigger();
        let echo = sonar.echo();

        trig.write(true);
        assert!(!echo.read());
        trig.write(false);

        // Echo rises after the delay and lasts 2 ms for 34.3 cm
        clock.advance(999);
        assert!(!echo.read());
        clock.advance(1);
        assert!(echo.read());
        clock.advance(1_999_000);
        assert!(echo.read());
        clock.advance(2_000);
        assert!(!echo.read());
    }

    #[test]
    fn test_sonar_no_target() {
        let clock = SimClock::new(10);
        let sonar = SimSonar::new(Arc::new(clock), 0);
        let mut trig = sonar.trigger();
        let echo = sonar.echo();

        trig.write(true);
        trig.write(false);
        for _ in 0..100 {
            assert!(!echo.read());
        }
    }

    #[test]
    fn test_motors_record() {
        let motors = SimMotors::new();
        let mut m = motors.clone();

        m.set_direction(MotorId::Left, Rotation::Backward).unwrap();
        m.set_duty_cycle(MotorId::Left, 40).unwrap();
        assert!(matches!(
            m.set_duty_cycle(MotorId::Right, 101),
            Err(MotorError::InvalidDutyCycle(101))
        ));

        assert_eq!(motors.motor(MotorId::Left), (Some(Rotation::Backward), 40));
        assert_eq!(motors.motor(MotorId::Right), (None, 0));
        assert_eq!(motors.history().len(), 2);

        motors.set_fail(true);
        assert!(m.set_duty_cycle(MotorId::Left, 10).is_err());
        assert_eq!(motors.motor(MotorId::Left).1, 40);
    }
}
