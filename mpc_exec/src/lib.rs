//! # MPC library.
//!
//! This library allows the executable, benchmarks and other crates in the
//! workspace to access the controller modules.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// MPC control module - computes steering and throttle commands over a receding horizon
pub mod mpc_ctrl;

/// Executable parameters
pub mod params;
