//! Nonlinear trajectory tracking controller for differential drivetrains

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::kin::ChassisSpeeds;
use crate::loc::Pose;
use crate::traj::TrajectoryState;
use util::maths::get_ang_dist_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ramsete nonlinear unicycle controller.
///
/// A purely linear controller on a non-holonomic base can demand lateral
/// motion the base cannot produce. This law instead feeds the body-frame
/// cross-track and heading errors back nonlinearly, so the robot converges
/// onto the path tangent rather than merely its position.
///
/// Gains: `b > 0` (rad^2/m^2) sets convergence aggressiveness, `zeta` in
/// (0, 1) sets damping.
#[derive(Debug, Serialize, Clone)]
pub struct RamseteCtrl {
    /// Convergence gain.
    ///
    /// Units: radians^2/meters^2
    b: f64,

    /// Damping ratio, unitless
    zeta: f64,

    /// Position tolerance used by `at_reference`. A zero tolerance is never
    /// satisfied.
    ///
    /// Units: meters
    pos_tol_m: f64,

    /// Heading tolerance used by `at_reference`. A zero tolerance is never
    /// satisfied.
    ///
    /// Units: radians
    head_tol_rad: f64,

    /// Distance to the reference at the most recent calculation
    pos_error_m: f64,

    /// Signed heading error to the reference at the most recent calculation
    head_error_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RamseteCtrl {
    /// Create a new controller with the given gains and tolerances.
    pub fn new(b: f64, zeta: f64, pos_tol_m: f64, head_tol_rad: f64) -> Self {
        Self {
            b,
            zeta,
            pos_tol_m,
            head_tol_rad,
            pos_error_m: f64::INFINITY,
            head_error_rad: f64::INFINITY,
        }
    }

    /// Clear the error history ready for a new trajectory.
    pub fn reset(&mut self) {
        self.pos_error_m = f64::INFINITY;
        self.head_error_rad = f64::INFINITY;
    }

    /// Get the corrected chassis speeds for the current pose and reference
    /// trajectory state.
    ///
    /// The reference feedforward velocity carries the nominal motion, the
    /// nonlinear feedback corrects drift towards the path tangent.
    pub fn calculate(&mut self, pose: &Pose, reference: &TrajectoryState) -> ChassisSpeeds {
        let dx_m = reference.pose.position_m_lm[0] - pose.position_m_lm[0];
        let dy_m = reference.pose.position_m_lm[1] - pose.position_m_lm[1];

        // Error expressed in the body frame
        let (sin_h, cos_h) = pose.get_heading().sin_cos();
        let e_x_m = cos_h * dx_m + sin_h * dy_m;
        let e_y_m = -sin_h * dx_m + cos_h * dy_m;
        let e_head_rad = get_ang_dist_2pi(pose.get_heading(), reference.pose.get_heading());

        self.pos_error_m = dx_m.hypot(dy_m);
        self.head_error_rad = e_head_rad;

        // Reference velocities along the path
        let v_ref_ms = reference.velocity_ms;
        let omega_ref_rads = v_ref_ms * reference.curvature_m;

        // Time-varying gain
        let k = 2.0
            * self.zeta
            * (omega_ref_rads * omega_ref_rads + self.b * v_ref_ms * v_ref_ms).sqrt();

        ChassisSpeeds {
            vx_ms: v_ref_ms * e_head_rad.cos() + k * e_x_m,
            vy_ms: 0.0,
            omega_rads: omega_ref_rads
                + k * e_head_rad
                + self.b * v_ref_ms * sinc(e_head_rad) * e_y_m,
        }
    }

    /// True only when both the position and heading errors of the most
    /// recent calculation are strictly within the configured tolerances.
    ///
    /// This is a pure function of the last error computation. Unset (zero)
    /// tolerances are never satisfied, preventing premature completion.
    pub fn at_reference(&self) -> bool {
        self.pos_error_m < self.pos_tol_m && self.head_error_rad.abs() < self.head_tol_rad
    }

    /// Distance to the reference at the most recent calculation.
    pub fn pos_error_m(&self) -> f64 {
        self.pos_error_m
    }

    /// Signed heading error at the most recent calculation.
    pub fn head_error_rad(&self) -> f64 {
        self.head_error_rad
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// sin(x)/x, continuous through zero.
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        // Second order Taylor expansion of sin(x)/x
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn reference(x_m: f64, velocity_ms: f64, curvature_m: f64) -> TrajectoryState {
        TrajectoryState {
            time_s: 0.0,
            pose: Pose::new(x_m, 0.0, 0.0),
            velocity_ms,
            accel_ms2: 0.0,
            curvature_m,
        }
    }

    #[test]
    fn test_on_path_is_pure_feedforward() {
        let mut ctrl = RamseteCtrl::new(2.0, 0.7, 0.1, 0.1);

        let speeds = ctrl.calculate(&Pose::new(1.0, 0.0, 0.0), &reference(1.0, 2.0, 0.25));

        assert_relative_eq!(speeds.vx_ms, 2.0, epsilon = 1e-12);
        assert_relative_eq!(speeds.vy_ms, 0.0);
        assert_relative_eq!(speeds.omega_rads, 0.5, epsilon = 1e-12);
        assert!(ctrl.at_reference());
    }

    #[test]
    fn test_lateral_offset_steers_towards_path() {
        let mut ctrl = RamseteCtrl::new(2.0, 0.7, 0.1, 0.1);

        // Robot to the right of the reference (reference is at +y relative
        // to the robot): expect a left (positive) turn demand
        let speeds = ctrl.calculate(&Pose::new(0.0, -0.5, 0.0), &reference(0.0, 1.0, 0.0));

        assert!(speeds.omega_rads > 0.0);
        assert!(!ctrl.at_reference());
    }

    #[test]
    fn test_behind_reference_speeds_up() {
        let mut ctrl = RamseteCtrl::new(2.0, 0.7, 0.1, 0.1);

        let speeds = ctrl.calculate(&Pose::new(0.0, 0.0, 0.0), &reference(0.5, 1.0, 0.0));

        assert!(speeds.vx_ms > 1.0);
    }

    #[test]
    fn test_zero_tolerances_never_at_reference() {
        let mut ctrl = RamseteCtrl::new(2.0, 0.7, 0.0, 0.0);

        // Perfectly on the reference, but the tolerances are unset
        ctrl.calculate(&Pose::new(0.0, 0.0, 0.0), &reference(0.0, 1.0, 0.0));

        assert!(!ctrl.at_reference());
    }

    #[test]
    fn test_not_at_reference_before_first_calculation() {
        let ctrl = RamseteCtrl::new(2.0, 0.7, 0.5, 0.5);

        assert!(!ctrl.at_reference());
    }
}
