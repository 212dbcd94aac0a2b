//! Trajectory tracking controller for holonomic (omni) drivetrains

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{PidController, ProfiledPidController};
use crate::kin::ChassisSpeeds;
use crate::loc::Pose;
use crate::traj::TrajectoryState;
use util::maths::get_ang_dist_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holonomic trajectory tracking controller.
///
/// Translation and heading are decoupled: one PID per translation axis
/// corrects position drift against the reference, while the heading is
/// driven by a velocity/acceleration profiled controller towards an
/// independently specified target heading, which may differ from the path's
/// direction of travel. The reference feedforward velocity carries the
/// nominal motion.
#[derive(Debug, Serialize, Clone)]
pub struct HolonomicCtrl {
    /// LM_X axis position error controller
    x_ctrl: PidController,

    /// LM_Y axis position error controller
    y_ctrl: PidController,

    /// Heading error controller, profile bounded
    head_ctrl: ProfiledPidController,

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

    /// Signed heading error to the target heading at the most recent
    /// calculation
    head_error_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HolonomicCtrl {
    /// Create a new controller.
    ///
    /// `pos_gains` and `head_gains` are `(k_p, k_i, k_d)` triples for the
    /// translation and heading controllers respectively.
    pub fn new(
        pos_gains: (f64, f64, f64),
        head_gains: (f64, f64, f64),
        head_max_vel_rads: f64,
        head_max_acc_rads2: f64,
        pos_tol_m: f64,
        head_tol_rad: f64,
    ) -> Self {
        Self {
            x_ctrl: PidController::new(pos_gains.0, pos_gains.1, pos_gains.2),
            y_ctrl: PidController::new(pos_gains.0, pos_gains.1, pos_gains.2),
            head_ctrl: ProfiledPidController::new(
                head_gains.0,
                head_gains.1,
                head_gains.2,
                head_max_vel_rads,
                head_max_acc_rads2,
            ),
            pos_tol_m,
            head_tol_rad,
            pos_error_m: f64::INFINITY,
            head_error_rad: f64::INFINITY,
        }
    }

    /// Reset the controller state for a new trajectory, starting the
    /// heading profile from the given pose.
    pub fn reset(&mut self, pose: &Pose) {
        self.x_ctrl.reset();
        self.y_ctrl.reset();
        self.head_ctrl.reset(pose.get_heading());
        self.pos_error_m = f64::INFINITY;
        self.head_error_rad = f64::INFINITY;
    }

    /// Get the corrected chassis speeds for the current pose, reference
    /// trajectory state and desired heading.
    pub fn calculate(
        &mut self,
        pose: &Pose,
        reference: &TrajectoryState,
        target_heading_rad: f64,
        dt_s: f64,
    ) -> ChassisSpeeds {
        // Position errors in the LM frame
        let x_err_m = reference.pose.position_m_lm[0] - pose.position_m_lm[0];
        let y_err_m = reference.pose.position_m_lm[1] - pose.position_m_lm[1];

        self.pos_error_m = x_err_m.hypot(y_err_m);
        self.head_error_rad = get_ang_dist_2pi(pose.get_heading(), target_heading_rad);

        // Feedforward from the reference, along the reference heading
        let (ref_sin, ref_cos) = reference.pose.get_heading().sin_cos();
        let vx_ff_ms = reference.velocity_ms * ref_cos;
        let vy_ff_ms = reference.velocity_ms * ref_sin;

        // Feedback corrections in the LM frame
        let vx_lm_ms = vx_ff_ms + self.x_ctrl.update(x_err_m, dt_s);
        let vy_lm_ms = vy_ff_ms + self.y_ctrl.update(y_err_m, dt_s);

        let omega_rads = self
            .head_ctrl
            .update(target_heading_rad, pose.get_heading(), dt_s);

        // Rotate the demand from the LM frame into the body frame
        let (sin_h, cos_h) = pose.get_heading().sin_cos();

        ChassisSpeeds {
            vx_ms: cos_h * vx_lm_ms + sin_h * vy_lm_ms,
            vy_ms: -sin_h * vx_lm_ms + cos_h * vy_lm_ms,
            omega_rads,
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
