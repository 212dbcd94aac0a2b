//! PID and profiled PID controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths::{clamp, get_ang_dist_2pi, wrap_2pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Position error below which the heading profile snaps onto its goal.
///
/// Units: radians
const PROFILE_SNAP_POS_RAD: f64 = 1e-4;

/// Profile velocity below which the heading profile snaps onto its goal.
///
/// Units: radians/second
const PROFILE_SNAP_VEL_RADS: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller.
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

/// A PID controller whose setpoint follows a trapezoidal velocity profile.
///
/// Used for heading control so that corrections never demand discontinuous
/// angular motion: the internal setpoint slews towards the goal at no more
/// than the configured angular velocity and acceleration, and the PID acts
/// on the error between the measurement and that setpoint. All angles are
/// treated modulo a full turn.
#[derive(Debug, Serialize, Clone)]
pub struct ProfiledPidController {
    pid: PidController,

    /// Maximum profile angular velocity.
    ///
    /// Units: radians/second
    max_vel_rads: f64,

    /// Maximum profile angular acceleration.
    ///
    /// Units: radians/second^2
    max_acc_rads2: f64,

    /// Profile setpoint position, in [0, 2*pi)
    sp_pos_rad: f64,

    /// Profile setpoint velocity
    sp_vel_rads: f64,

    /// True once the setpoint has been initialised from a measurement
    init: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral: 0f64,
            prev_error: None,
        }
    }

    /// Clear the controller history (integral accumulation and previous
    /// error).
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }

    /// Get the value of the controller for the given error.
    ///
    /// `dt_s` is the time since the previous update. For non-positive time
    /// steps, and on the first update after a reset, neither the integral
    /// nor the derivative terms contribute, as either would produce a large
    /// spike compared to normal operation.
    pub fn update(&mut self, error: f64, dt_s: f64) -> f64 {
        let dt = if dt_s > 0f64 { Some(dt_s) } else { None };

        // Accumulate the integral term
        self.integral += match dt {
            Some(t) => error * t,
            None => 0f64,
        };

        // Calculate the derivative
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64,
        };

        // Calculate the output
        let out = self.k_p * error + self.k_i * self.integral + self.k_d * deriv;

        // Remember the previous error
        self.prev_error = Some(error);

        out
    }
}

impl ProfiledPidController {
    /// Create a new controller with the given gains and profile limits.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, max_vel_rads: f64, max_acc_rads2: f64) -> Self {
        Self {
            pid: PidController::new(k_p, k_i, k_d),
            max_vel_rads,
            max_acc_rads2,
            sp_pos_rad: 0f64,
            sp_vel_rads: 0f64,
            init: false,
        }
    }

    /// Reset the profile so that the setpoint starts from the given
    /// measurement at zero velocity.
    pub fn reset(&mut self, measurement_rad: f64) {
        self.pid.reset();
        self.sp_pos_rad = wrap_2pi(measurement_rad);
        self.sp_vel_rads = 0f64;
        self.init = true;
    }

    /// Get the angular rate demand for the given goal and measurement.
    ///
    /// The output is the PID correction towards the profiled setpoint plus
    /// the profile velocity feedforward, saturated at the maximum profile
    /// velocity.
    pub fn update(&mut self, goal_rad: f64, measurement_rad: f64, dt_s: f64) -> f64 {
        if !self.init {
            self.reset(measurement_rad);
        }

        if dt_s > 0f64 {
            self.advance_profile(goal_rad, dt_s);
        }

        let error_rad = get_ang_dist_2pi(wrap_2pi(measurement_rad), self.sp_pos_rad);
        let out = self.pid.update(error_rad, dt_s) + self.sp_vel_rads;

        clamp(&out, &-self.max_vel_rads, &self.max_vel_rads)
    }

    /// True once the profile setpoint has come to rest on its goal.
    pub fn is_settled(&self) -> bool {
        self.init && self.sp_vel_rads.abs() < PROFILE_SNAP_VEL_RADS
    }

    /// Step the trapezoidal profile towards the goal.
    fn advance_profile(&mut self, goal_rad: f64, dt_s: f64) {
        let goal_rad = wrap_2pi(goal_rad);
        let err_rad = get_ang_dist_2pi(self.sp_pos_rad, goal_rad);

        // Close enough and slow enough: rest on the goal
        if err_rad.abs() < PROFILE_SNAP_POS_RAD && self.sp_vel_rads.abs() < PROFILE_SNAP_VEL_RADS
        {
            self.sp_pos_rad = goal_rad;
            self.sp_vel_rads = 0f64;
            return;
        }

        // The fastest velocity from which the profile can still brake to
        // rest at the goal, capped at the profile maximum
        let vel_limit_rads = (2f64 * self.max_acc_rads2 * err_rad.abs())
            .sqrt()
            .min(self.max_vel_rads);
        let target_vel_rads = err_rad.signum() * vel_limit_rads;

        // Slew towards the target velocity at no more than the maximum
        // acceleration
        let max_dv_rads = self.max_acc_rads2 * dt_s;
        let dv_rads = clamp(
            &(target_vel_rads - self.sp_vel_rads),
            &-max_dv_rads,
            &max_dv_rads,
        );
        self.sp_vel_rads += dv_rads;

        // If this step reaches the goal, rest on it rather than stepping
        // past and oscillating
        let step_rad = self.sp_vel_rads * dt_s;
        if err_rad.signum() * self.sp_vel_rads >= 0f64 && step_rad.abs() >= err_rad.abs() {
            self.sp_pos_rad = goal_rad;
            self.sp_vel_rads = 0f64;
        } else {
            self.sp_pos_rad = wrap_2pi(self.sp_pos_rad + step_rad);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_pid_proportional() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);

        assert_relative_eq!(pid.update(0.5, 0.02), 1.0);
        assert_relative_eq!(pid.update(-0.25, 0.02), -0.5);
    }

    #[test]
    fn test_pid_no_first_update_kick() {
        // With pure derivative gain the first update must produce no
        // output, there is no error history to difference against
        let mut pid = PidController::new(0.0, 0.0, 1.0);

        assert_relative_eq!(pid.update(10.0, 0.02), 0.0);

        // The second update sees the full history
        assert_relative_eq!(pid.update(10.2, 0.02), 10.0);
    }

    #[test]
    fn test_pid_zero_dt() {
        let mut pid = PidController::new(0.0, 1.0, 1.0);

        // Non-positive dt accumulates nothing
        assert_relative_eq!(pid.update(1.0, 0.0), 0.0);
        assert_relative_eq!(pid.update(1.0, -0.1), 0.0);
    }

    #[test]
    fn test_profile_rate_bounded() {
        let mut ctrl = ProfiledPidController::new(4.0, 0.0, 0.0, 1.0, 2.0);
        ctrl.reset(0.0);

        let dt_s = 0.02;
        let mut measurement_rad = 0f64;

        for _ in 0..500 {
            let out = ctrl.update(FRAC_PI_2, measurement_rad, dt_s);

            // The demand is always inside the profile velocity limit
            assert!(out.abs() <= 1.0 + 1e-9);

            measurement_rad += out * dt_s;
        }

        // The measurement has converged onto the goal
        assert_relative_eq!(measurement_rad, FRAC_PI_2, epsilon = 0.05);
        assert!(ctrl.is_settled());
    }

    #[test]
    fn test_profile_takes_shortest_arc() {
        // Goal 0.2 rad behind the wrap point: the profile must move through
        // zero, not the long way round
        let mut ctrl = ProfiledPidController::new(4.0, 0.0, 0.0, 1.0, 2.0);
        ctrl.reset(0.1);

        let out = ctrl.update(std::f64::consts::TAU - 0.1, 0.1, 0.02);

        assert!(out < 0.0);
    }
}
