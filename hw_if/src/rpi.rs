//! # Raspberry Pi equipment
//!
//! Implementations of the equipment interfaces on top of `rppal`. GPIO, SPI and I2C are opened
//! during startup, before any worker thread is spawned, and any error here is fatal.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// GPIO pins for the line sensors and the ultrasonic sensors.
pub mod gpio;

/// LS7366R quadrature counter driver.
pub mod ls7366r;

/// TB6612FNG motor driver behind a PCA9685 PWM board.
pub mod pca9685;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use self::gpio::{RpiGpio, RpiInput, RpiOutput};
pub use self::ls7366r::Ls7366r;
pub use self::pca9685::Tb6612;
