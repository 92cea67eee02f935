//! # Navigation library.
//!
//! The navigation core of the line following robot. Sensor workers publish into lock-free cells,
//! the control loop reads them and drives the motors through either line steering or the
//! obstacle avoidance manouvre.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive primitives - speed ramps and mounting aware direction changes
pub mod drive;

/// Encoder channel - wheel speed from a hardware quadrature counter
pub mod encoder;

/// Hardware set - opens the Raspberry Pi or simulated equipment
pub mod hardware;

/// Line array - polls the line sensor pins
pub mod line_array;

/// Obstacle avoidance - sequences the manouvre around an obstacle
pub mod obst_avoid;

/// Orchestrator - spawns the sensor workers and runs the control loop
pub mod orchestrator;

/// Executable parameters
pub mod params;

/// Range sensor - ultrasonic ranging with a running confidence
pub mod range_sensor;

/// Shared sensor state - atomic cells written by the workers
pub mod shared;

/// Steering control - confidence gated line following
pub mod steer_ctrl;
