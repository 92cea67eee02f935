//! # Digital IO interfaces

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A single digital input line.
pub trait DigitalInput {
    /// Read the current level of the line, `true` being HIGH.
    fn read(&self) -> bool;
}

/// A single digital output line.
pub trait DigitalOutput {
    /// Drive the line to the given level, `true` being HIGH.
    fn write(&mut self, level: bool);
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read(&self) -> bool {
        (**self).read()
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn write(&mut self, level: bool) {
        (**self).write(level)
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while acquiring GPIO pins.
#[derive(thiserror::Error, Debug)]
pub enum GpioError {
    #[error("Could not access the GPIO peripheral: {0}")]
    Peripheral(rppal::gpio::Error),

    #[error("Could not acquire GPIO pin {0}: {1}")]
    Pin(u8, rppal::gpio::Error),
}
