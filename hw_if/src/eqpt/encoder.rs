//! # Quadrature counter interface
//!
//! The wheel encoders are decoded in hardware by a quadrature counter chip on the SPI bus. The
//! navigation core only ever clears and reads the counter, chip setup is a one-off step done by
//! the backend before any worker starts.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Transport to a hardware quadrature counter.
pub trait EncoderTransport {
    /// Reset the counter of the chip on the given chip select to zero.
    fn clear_counter(&mut self, chip_select: ChipSelect) -> Result<(), TransportError>;

    /// Read the signed 32 bit count of the chip on the given chip select.
    fn read_counter(&mut self, chip_select: ChipSelect) -> Result<i32, TransportError>;
}

impl<T: EncoderTransport + ?Sized> EncoderTransport for Box<T> {
    fn clear_counter(&mut self, chip_select: ChipSelect) -> Result<(), TransportError> {
        (**self).clear_counter(chip_select)
    }

    fn read_counter(&mut self, chip_select: ChipSelect) -> Result<i32, TransportError> {
        (**self).read_counter(chip_select)
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Chip select lines of the SPI bus the counters are attached to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipSelect {
    Ce0,
    Ce1,
}

/// Errors which can occur when talking to a counter chip.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Chip select {0:?} is not handled by this transport")]
    UnknownChipSelect(ChipSelect),

    #[error("Expected {expected} bytes from the counter, got {got}")]
    ShortTransfer { expected: usize, got: usize },

    #[error("Simulated transfer fault")]
    Simulated,
}
