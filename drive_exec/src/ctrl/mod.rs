//! # Feedback controllers module
//!
//! This module provides the feedback controllers used to keep the robot on
//! the target trajectory: the PID and profiled-PID primitives, the
//! holonomic controller used with omni drivetrains, and the nonlinear
//! unicycle controller used with differential drivetrains.
//!
//! The trajectory feedforward carries the nominal motion; these controllers
//! only correct drift between the measured pose and the reference.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod holo;
mod pid;
mod ramsete;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use holo::HolonomicCtrl;
pub use pid::{PidController, ProfiledPidController};
pub use ramsete::RamseteCtrl;
