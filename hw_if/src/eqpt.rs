//! # Equipment Interface
//!
//! This module defines the interfaces between the navigation core and the robot's equipment. Each
//! interface is implemented once per backend (see [`crate::rpi`] and [`crate::sim`]).
//!
//! Interface objects are per-pin or per-chip: a line sensor worker owns exactly the input it
//! reads, so no equipment object is ever shared between threads.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod clock;
pub mod encoder;
pub mod gpio;
pub mod motor;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use clock::{Clock, MonotonicClock};
pub use encoder::{ChipSelect, EncoderTransport, TransportError};
pub use gpio::{DigitalInput, DigitalOutput, GpioError};
pub use motor::{MotorActuator, MotorCommand, MotorError, MotorId, Rotation};
