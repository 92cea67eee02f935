//! # Hardware interface crate.
//!
//! Provides the interfaces the navigation software uses to talk to the robot's equipment, along
//! with implementations for the Raspberry Pi and a simulated equivalent for host runs and tests.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Equipment interface traits and the types they exchange
pub mod eqpt;

/// Raspberry Pi implementations of the equipment interfaces
pub mod rpi;

/// Simulated equipment
pub mod sim;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use eqpt::*;
