//! [`MotorActuator`] implementation for a TB6612FNG dual H-bridge driven by a PCA9685 PWM board

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use log::debug;
use pwm_pca9685::{Address, Channel, Pca9685};
use rppal::i2c::I2c;

use crate::eqpt::{MotorActuator, MotorError, MotorId, Rotation};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const MAX_PWM: u16 = 4095;

/// Prescale giving a 100 Hz PWM frequency from the 25 MHz internal oscillator.
const PRESCALE_100_HZ: u8 = 60;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The motor driver HAT: a TB6612FNG whose PWM and direction inputs are all wired to channels of
/// a PCA9685.
pub struct Tb6612<I2C> {
    pwm: Pca9685<I2C>,
}

/// PCA9685 channels used by one motor.
struct MotorChannels {
    pwm: Channel,
    in1: Channel,
    in2: Channel,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tb6612<I2c> {
    /// Open the I2C bus and initialise the PCA9685 at the given address.
    pub fn new(i2c_address: u8) -> Result<Self, MotorError> {
        let i2c = I2c::new().map_err(|e| MotorError::I2c(e.to_string()))?;

        Self::from_i2c(i2c, i2c_address)
    }
}

impl<I2C, E> Tb6612<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: std::fmt::Debug,
{
    /// Initialise the PCA9685 on an already opened bus.
    pub fn from_i2c(i2c: I2C, i2c_address: u8) -> Result<Self, MotorError> {
        let mut pwm = Pca9685::new(i2c, Address::from(i2c_address)).map_err(map_pwm_err)?;

        pwm.set_prescale(PRESCALE_100_HZ).map_err(map_pwm_err)?;
        pwm.enable().map_err(map_pwm_err)?;

        debug!("PCA9685 at {:#04x} initialised", i2c_address);

        let mut driver = Self { pwm };

        // Both motors start stopped
        driver.set_duty_cycle(MotorId::Left, 0)?;
        driver.set_duty_cycle(MotorId::Right, 0)?;

        Ok(driver)
    }

    fn set_level(&mut self, channel: Channel, level: bool) -> Result<(), MotorError> {
        match level {
            true => self.pwm.set_channel_full_on(channel, 0),
            false => self.pwm.set_channel_full_off(channel),
        }
        .map_err(map_pwm_err)
    }
}

impl<I2C, E> MotorActuator for Tb6612<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: std::fmt::Debug,
{
    fn set_direction(&mut self, motor: MotorId, rotation: Rotation) -> Result<(), MotorError> {
        let ch = MotorChannels::of(motor);

        match rotation {
            Rotation::Forward => {
                self.set_level(ch.in1, false)?;
                self.set_level(ch.in2, true)
            }
            Rotation::Backward => {
                self.set_level(ch.in1, true)?;
                self.set_level(ch.in2, false)
            }
        }
    }

    fn set_duty_cycle(&mut self, motor: MotorId, percent: u8) -> Result<(), MotorError> {
        if percent > 100 {
            return Err(MotorError::InvalidDutyCycle(percent));
        }

        let channel = MotorChannels::of(motor).pwm;

        // Equal on and off counts are not a reliable zero
        if percent == 0 {
            return self.pwm.set_channel_full_off(channel).map_err(map_pwm_err);
        }

        let off = util::maths::lin_map((0f64, 100f64), (0f64, MAX_PWM as f64), percent as f64);

        self.pwm
            .set_channel_on_off(channel, 0, off.round() as u16)
            .map_err(map_pwm_err)
    }
}

impl MotorChannels {
    fn of(motor: MotorId) -> Self {
        match motor {
            MotorId::Left => MotorChannels {
                pwm: Channel::C0,
                in1: Channel::C1,
                in2: Channel::C2,
            },
            MotorId::Right => MotorChannels {
                pwm: Channel::C5,
                in1: Channel::C3,
                in2: Channel::C4,
            },
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn map_pwm_err<E: std::fmt::Debug>(e: pwm_pca9685::Error<E>) -> MotorError {
    match e {
        pwm_pca9685::Error::I2C(e) => MotorError::I2c(format!("{:?}", e)),
        pwm_pca9685::Error::InvalidInputData => {
            MotorError::I2c("PCA9685 rejected the input data".into())
        }
    }
}
