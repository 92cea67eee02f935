//! [`DigitalInput`] and [`DigitalOutput`] implementations for the Raspberry Pi GPIO header

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::eqpt::{DigitalInput, DigitalOutput, GpioError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the GPIO peripheral, used to acquire individual pins.
pub struct RpiGpio {
    gpio: Gpio,
}

/// A GPIO pin configured as an input.
pub struct RpiInput(InputPin);

/// A GPIO pin configured as an output.
pub struct RpiOutput(OutputPin);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RpiGpio {
    pub fn new() -> Result<Self, GpioError> {
        Ok(Self {
            gpio: Gpio::new().map_err(GpioError::Peripheral)?,
        })
    }

    /// Acquire the pin with the given BCM number as a floating input.
    pub fn input(&self, bcm_pin: u8) -> Result<RpiInput, GpioError> {
        let pin = self
            .gpio
            .get(bcm_pin)
            .map_err(|e| GpioError::Pin(bcm_pin, e))?;

        Ok(RpiInput(pin.into_input()))
    }

    /// Acquire the pin with the given BCM number as an output, initially LOW.
    pub fn output(&self, bcm_pin: u8) -> Result<RpiOutput, GpioError> {
        let pin = self
            .gpio
            .get(bcm_pin)
            .map_err(|e| GpioError::Pin(bcm_pin, e))?;

        Ok(RpiOutput(pin.into_output_low()))
    }
}

impl DigitalInput for RpiInput {
    fn read(&self) -> bool {
        self.0.is_high()
    }
}

impl DigitalOutput for RpiOutput {
    fn write(&mut self, level: bool) {
        if level {
            self.0.set_high()
        } else {
            self.0.set_low()
        }
    }
}
