//! Drive manager parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::kin::DrivetrainConfig;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drive manager.
///
/// Gains and tolerances are explicit configuration owned by the manager
/// from construction, there are no ambient tunables.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Drivetrain geometry. Selects both the kinematics model and the
    /// matching trajectory controller.
    pub drivetrain: DrivetrainConfig,

    /// Position controller proportional gain (each translation axis)
    pub pos_k_p: f64,

    /// Position controller integral gain
    pub pos_k_i: f64,

    /// Position controller derivative gain
    pub pos_k_d: f64,

    /// Heading controller proportional gain
    pub head_k_p: f64,

    /// Heading controller integral gain
    pub head_k_i: f64,

    /// Heading controller derivative gain
    pub head_k_d: f64,

    /// Maximum angular velocity of the heading correction profile.
    ///
    /// Units: radians/second
    pub head_max_vel_rads: f64,

    /// Maximum angular acceleration of the heading correction profile.
    ///
    /// Units: radians/second^2
    pub head_max_acc_rads2: f64,

    /// Convergence gain of the differential-drive tracking law.
    ///
    /// Units: radians^2/meters^2
    pub ramsete_b: f64,

    /// Damping ratio of the differential-drive tracking law, unitless
    pub ramsete_zeta: f64,

    /// Position tolerance for declaring the reference reached. A zero
    /// tolerance is never satisfied.
    ///
    /// Units: meters
    pub pos_tol_m: f64,

    /// Heading tolerance for declaring the reference reached. A zero
    /// tolerance is never satisfied.
    ///
    /// Units: radians
    pub head_tol_rad: f64,
}
