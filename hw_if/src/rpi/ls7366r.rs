//! [`EncoderTransport`] implementation for the LS7366R 32 bit quadrature counter

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{thread, time::Duration};

use log::debug;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::eqpt::{ChipSelect, EncoderTransport, TransportError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

// Opcodes, the top two bits select the operation and the next three the register
const CLEAR_COUNTER: u8 = 0x20;
const CLEAR_STATUS: u8 = 0x30;
const READ_COUNTER: u8 = 0x60;
const WRITE_MODE0: u8 = 0x88;
const WRITE_MODE1: u8 = 0x90;

/// MDR0: 4x quadrature count mode
const FOURX_COUNT: u8 = 0x03;

/// MDR1: 4 byte counter
const FOURBYTE_COUNTER: u8 = 0x00;

/// Pause between mode register writes during initialisation.
const INIT_SETTLE: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One LS7366R chip on the SPI0 bus.
///
/// Each chip gets its own instance so that each encoder worker owns its transport.
pub struct Ls7366r {
    spi: Spi,
    chip_select: ChipSelect,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Ls7366r {
    /// Open the chip on the given chip select and configure it for 4x counting into a 4 byte
    /// counter, then clear its status and counter.
    pub fn init(chip_select: ChipSelect, clock_speed_hz: u32) -> Result<Self, TransportError> {
        let slave_select = match chip_select {
            ChipSelect::Ce0 => SlaveSelect::Ss0,
            ChipSelect::Ce1 => SlaveSelect::Ss1,
        };

        let mut chip = Self {
            spi: Spi::new(Bus::Spi0, slave_select, clock_speed_hz, Mode::Mode0)?,
            chip_select,
        };

        thread::sleep(INIT_SETTLE);
        chip.write(&[WRITE_MODE0, FOURX_COUNT])?;
        thread::sleep(INIT_SETTLE);
        chip.write(&[WRITE_MODE1, FOURBYTE_COUNTER])?;
        chip.write(&[CLEAR_STATUS])?;
        chip.write(&[CLEAR_COUNTER])?;

        debug!("LS7366R on {:?} initialised", chip_select);

        Ok(chip)
    }

    fn check_chip_select(&self, chip_select: ChipSelect) -> Result<(), TransportError> {
        if chip_select == self.chip_select {
            Ok(())
        } else {
            Err(TransportError::UnknownChipSelect(chip_select))
        }
    }

    fn write(&mut self, msg: &[u8]) -> Result<(), TransportError> {
        let written = self.spi.write(msg)?;

        if written != msg.len() {
            return Err(TransportError::ShortTransfer {
                expected: msg.len(),
                got: written,
            });
        }

        Ok(())
    }
}

impl EncoderTransport for Ls7366r {
    fn clear_counter(&mut self, chip_select: ChipSelect) -> Result<(), TransportError> {
        self.check_chip_select(chip_select)?;
        self.write(&[CLEAR_COUNTER])
    }

    fn read_counter(&mut self, chip_select: ChipSelect) -> Result<i32, TransportError> {
        self.check_chip_select(chip_select)?;

        let msg = [READ_COUNTER, 0, 0, 0, 0];
        let mut rx = [0u8; 5];
        let got = self.spi.transfer(&mut rx, &msg)?;

        if got != msg.len() {
            return Err(TransportError::ShortTransfer {
                expected: msg.len(),
                got,
            });
        }

        // First byte is clocked out while the opcode is sent, the count follows MSB first
        Ok(decode_count(&rx))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn decode_count(rx: &[u8; 5]) -> i32 {
    i32::from_be_bytes([rx[1], rx[2], rx[3], rx[4]])
}
