//! Drive telemetry packet

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry packet summarising the drive state, produced every cycle
/// regardless of mode for the visualisation collaborator.
///
/// Fire-and-forget: failures to deliver this packet must never affect
/// control.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriveTm {
    /// Executing mode
    pub mode: String,

    /// Robot position in the LM frame, meters
    pub x_m: f64,
    pub y_m: f64,

    /// Robot heading in the LM frame, radians
    pub heading_rad: f64,

    /// Measured body velocities
    pub vx_ms: f64,
    pub vy_ms: f64,
    pub omega_rads: f64,

    /// Elapsed time of the current autonomous operation, seconds
    pub elapsed_s: f64,

    /// Distance to the reference, meters
    pub pos_error_m: f64,

    /// Signed heading error, radians
    pub head_error_rad: f64,
}
