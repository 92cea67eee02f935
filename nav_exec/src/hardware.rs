//! # Hardware set
//!
//! Opens every piece of equipment the navigation core uses, either on the Raspberry Pi or as
//! simulated stand-ins. All of it is opened and initialised before any worker starts.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use log::info;

use hw_if::{
    rpi::{Ls7366r, RpiGpio, Tb6612},
    sim::{SimEncoder, SimMotors, SimPin, SimSonar},
    Clock, DigitalInput, DigitalOutput, EncoderTransport, GpioError, MotorActuator, MotorError,
    MonotonicClock, TransportError,
};

use crate::params::NavExecParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Delay between the trigger and the echo rising on the simulated sonars.
///
/// Units: nanoseconds
const SIM_ECHO_DELAY_NS: u64 = 100_000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub type BoxedInput = Box<dyn DigitalInput + Send>;
pub type BoxedOutput = Box<dyn DigitalOutput + Send>;
pub type BoxedTransport = Box<dyn EncoderTransport + Send>;
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Trigger and echo lines of one ultrasonic sensor.
pub struct SonarPins {
    pub trigger: BoxedOutput,
    pub echo: BoxedInput,
}

/// Every piece of equipment used by the navigation core.
pub struct Hardware<M> {
    pub motors: M,
    pub sensors: SensorHardware,
}

/// Equipment read by the sensor workers.
pub struct SensorHardware {
    pub clock: SharedClock,

    pub front_sonar: SonarPins,
    pub side_sonar: SonarPins,

    pub left_encoder: BoxedTransport,
    pub right_encoder: BoxedTransport,

    /// Front left, front centre, front right.
    pub line_inner: [BoxedInput; 3],

    /// Outer left, outer right.
    pub line_outer: Option<[BoxedInput; 2]>,
}

/// Handles onto simulated hardware, used to drive the simulation from outside.
#[derive(Clone)]
pub struct SimHandles {
    pub motors: SimMotors,
    pub front_sonar: SimSonar,
    pub side_sonar: SimSonar,
    pub left_encoder: SimEncoder,
    pub right_encoder: SimEncoder,
    pub line_inner: [SimPin; 3],
    pub line_outer: Option<[SimPin; 2]>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("Could not initialise the encoder counter: {0}")]
    Encoder(#[from] TransportError),

    #[error("Could not initialise the motor driver: {0}")]
    Motor(#[from] MotorError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SensorHardware {
    pub fn has_outer(&self) -> bool {
        self.line_outer.is_some()
    }
}

impl Hardware<Box<dyn MotorActuator>> {
    /// Open the equipment on the Raspberry Pi.
    pub fn raspberry_pi(params: &NavExecParams) -> Result<Self, HardwareError> {
        let pins = &params.pins;
        let bus = &params.bus;

        let gpio = RpiGpio::new()?;
        let input = |pin| -> Result<BoxedInput, GpioError> { Ok(Box::new(gpio.input(pin)?)) };
        let output = |pin| -> Result<BoxedOutput, GpioError> { Ok(Box::new(gpio.output(pin)?)) };

        let line_outer = match (pins.line_outer_left, pins.line_outer_right) {
            (Some(l), Some(r)) => Some([input(l)?, input(r)?]),
            _ => None,
        };

        let sensors = SensorHardware {
            clock: Arc::new(MonotonicClock::new()),
            front_sonar: SonarPins {
                trigger: output(pins.front_sonar_trigger)?,
                echo: input(pins.front_sonar_echo)?,
            },
            side_sonar: SonarPins {
                trigger: output(pins.side_sonar_trigger)?,
                echo: input(pins.side_sonar_echo)?,
            },
            left_encoder: Box::new(Ls7366r::init(bus.left_encoder_cs, bus.spi_clock_hz)?),
            right_encoder: Box::new(Ls7366r::init(bus.right_encoder_cs, bus.spi_clock_hz)?),
            line_inner: [
                input(pins.line_left)?,
                input(pins.line_centre)?,
                input(pins.line_right)?,
            ],
            line_outer,
        };
        let motors: Box<dyn MotorActuator> = Box::new(Tb6612::new(bus.pwm_address)?);

        info!("Raspberry Pi hardware initialised");

        Ok(Self { motors, sensors })
    }
}

impl Hardware<SimMotors> {
    /// Create simulated equipment, returning it alongside handles to drive it.
    ///
    /// The sonars start with no target in range, the encoders count nothing and the line sensors
    /// are all off the line.
    pub fn simulated(params: &NavExecParams) -> (Self, SimHandles) {
        let clock: SharedClock = Arc::new(MonotonicClock::new());

        let handles = SimHandles {
            motors: SimMotors::new(),
            front_sonar: SimSonar::new(clock.clone(), SIM_ECHO_DELAY_NS),
            side_sonar: SimSonar::new(clock.clone(), SIM_ECHO_DELAY_NS),
            left_encoder: SimEncoder::default(),
            right_encoder: SimEncoder::default(),
            line_inner: [SimPin::default(), SimPin::default(), SimPin::default()],
            line_outer: match params.pins.has_outer() {
                true => Some([SimPin::default(), SimPin::default()]),
                false => None,
            },
        };

        let input = |p: &SimPin| -> BoxedInput { Box::new(p.clone()) };
        let sonar = |s: &SimSonar| SonarPins {
            trigger: Box::new(s.trigger()),
            echo: Box::new(s.echo()),
        };

        let sensors = SensorHardware {
            clock,
            front_sonar: sonar(&handles.front_sonar),
            side_sonar: sonar(&handles.side_sonar),
            left_encoder: Box::new(handles.left_encoder.clone()),
            right_encoder: Box::new(handles.right_encoder.clone()),
            line_inner: [
                input(&handles.line_inner[0]),
                input(&handles.line_inner[1]),
                input(&handles.line_inner[2]),
            ],
            line_outer: handles
                .line_outer
                .as_ref()
                .map(|o| [input(&o[0]), input(&o[1])]),
        };

        let hw = Self {
            motors: handles.motors.clone(),
            sensors,
        };

        (hw, handles)
    }
}
