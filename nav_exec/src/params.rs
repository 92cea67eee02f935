//! # Navigation Executable Parameters
//!
//! This module provides parameters for the navigation executable. Every table falls back to its
//! defaults, so a parameter file only needs to list what differs from the stock robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use hw_if::ChipSelect;

use crate::{drive, encoder, line_array, obst_avoid, range_sensor, steer_ctrl};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavExecParams {
    pub pins: PinParams,
    pub bus: BusParams,
    pub control: ControlParams,

    pub range_sensor: range_sensor::Params,
    pub encoder: encoder::Params,
    pub line_array: line_array::Params,
    pub steer_ctrl: steer_ctrl::Params,
    pub obst_avoid: obst_avoid::Params,
    pub drive: drive::Params,
}

/// GPIO pin numbers, using BCM numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinParams {
    pub line_left: u8,
    pub line_centre: u8,
    pub line_right: u8,

    /// The outer sensors are only used if both pins are given.
    pub line_outer_left: Option<u8>,
    pub line_outer_right: Option<u8>,

    pub front_sonar_trigger: u8,
    pub front_sonar_echo: u8,
    pub side_sonar_trigger: u8,
    pub side_sonar_echo: u8,
}

/// SPI and I2C bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusParams {
    pub left_encoder_cs: ChipSelect,
    pub right_encoder_cs: ChipSelect,

    /// Units: hertz
    pub spi_clock_hz: u32,

    /// I2C address of the PWM driver.
    pub pwm_address: u8,
}

/// Control loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Period of the sensor summary debug log.
    ///
    /// Units: seconds
    pub status_log_period_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PinParams {
    fn default() -> Self {
        Self {
            line_left: 17,
            line_centre: 27,
            line_right: 22,
            line_outer_left: Some(5),
            line_outer_right: Some(6),
            front_sonar_trigger: 23,
            front_sonar_echo: 24,
            side_sonar_trigger: 20,
            side_sonar_echo: 21,
        }
    }
}

impl PinParams {
    /// Whether the outer line sensors are fitted.
    pub fn has_outer(&self) -> bool {
        self.line_outer_left.is_some() && self.line_outer_right.is_some()
    }
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            left_encoder_cs: ChipSelect::Ce0,
            right_encoder_cs: ChipSelect::Ce1,
            spi_clock_hz: 100_000,
            pwm_address: 0x40,
        }
    }
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.001,
            status_log_period_s: 1.0,
        }
    }
}
