//! # Trajectory generator
//!
//! Builds a time-parameterised [`Trajectory`] from ordered waypoints under
//! velocity, acceleration and per-actuator constraints.
//!
//! The waypoint polyline is densified at a fixed point separation, a
//! curvature is derived at each point from the heading change over arc
//! length, and each point is given a velocity ceiling from the configured
//! limits (including the per-actuator limit taken through the kinematics
//! model). A forward accelerating pass and a backward braking pass then
//! produce the velocity profile, and timestamps follow by trapezoidal
//! integration.
//!
//! Generation either succeeds with a trajectory meeting every invariant of
//! [`Trajectory::new`], or fails with a [`GenError`] - it never produces
//! non-monotonic time or non-finite samples.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Deserialize;

// Internal
use super::{TrajError, Trajectory, TrajectoryState};
use crate::kin::{ChassisSpeeds, DrivetrainConfig, Kinematics};
use crate::loc::Pose;
use util::maths::{get_ang_dist_2pi, wrap_2pi};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors in trajectory generation.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("At least two waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("Waypoints produce a zero-length path")]
    ZeroLengthPath,

    #[error("Generator limit {name} must be positive, got {value}")]
    NonPositiveLimit { name: &'static str, value: f64 },

    #[error("No feasible time parameterisation: {0}")]
    Infeasible(&'static str),

    #[error("Generated an invalid trajectory: {0}")]
    Invalid(#[from] TrajError),
}

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default separation between generated samples along the path.
///
/// Units: meters
const DEFAULT_POINT_SEP_M: f64 = 0.05;

/// Waypoints closer together than this are treated as coincident.
///
/// Units: meters
const POINT_MERGE_EPS_M: f64 = 1e-9;

/// Fraction of the configured acceleration limit kept available when a
/// voltage constraint would otherwise leave no headroom at all.
const MIN_ACCEL_FRACTION: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configuration of the trajectory generator.
#[derive(Debug, Clone, Deserialize)]
pub struct GenConfig {
    /// Maximum velocity along the path.
    ///
    /// Units: meters/second
    pub max_velocity_ms: f64,

    /// Maximum acceleration along the path.
    ///
    /// Units: meters/second^2
    pub max_accel_ms2: f64,

    /// Separation between generated samples along the path.
    ///
    /// Units: meters
    #[serde(default = "default_point_sep")]
    pub point_sep_m: f64,

    /// If true the path is driven backwards: headings face opposite the
    /// direction of travel and velocities are negative.
    #[serde(default)]
    pub reversed: bool,

    /// Optional per-actuator speed limit, applied through the kinematics
    /// model so that no wheel or module ever exceeds it.
    ///
    /// Units: meters/second
    #[serde(default)]
    pub max_wheel_speed_ms: Option<f64>,

    /// Optional drive feedforward voltage constraint.
    #[serde(default)]
    pub voltage: Option<VoltageConstraint>,
}

/// Limits actuator velocity and acceleration to what the drive feedforward
/// can achieve within the given voltage headroom
/// (`V = ks + kv * v + ka * a`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoltageConstraint {
    /// Static feedforward gain.
    ///
    /// Units: volts
    pub ks_v: f64,

    /// Velocity feedforward gain.
    ///
    /// Units: volt-seconds/meter
    pub kv_vs_per_m: f64,

    /// Acceleration feedforward gain.
    ///
    /// Units: volt-seconds^2/meter
    pub ka_vs2_per_m: f64,

    /// Maximum voltage the constraint may use.
    ///
    /// Units: volts
    pub max_voltage_v: f64,
}

/// Parameters describing a generated mission, loaded from a parameter file.
#[derive(Debug, Clone, Deserialize)]
pub struct MissionParams {
    /// Ordered waypoints as `[x_m, y_m, heading_rad]` triples
    pub waypoints: Vec<[f64; 3]>,

    /// Drivetrain geometry used for the per-actuator generation constraint
    pub drivetrain: DrivetrainConfig,

    /// Generator configuration
    pub config: GenConfig,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MissionParams {
    /// The mission waypoints as poses.
    pub fn waypoint_poses(&self) -> Vec<Pose> {
        self.waypoints
            .iter()
            .map(|w| Pose::new(w[0], w[1], w[2]))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate a trajectory through the given waypoints.
///
/// Waypoint headings are advisory: the generated headings follow the path
/// tangent (opposite it when `config.reversed` is set).
pub fn generate(
    waypoints: &[Pose],
    config: &GenConfig,
    kin: &dyn Kinematics,
) -> Result<Trajectory, GenError> {
    validate_config(config)?;

    if waypoints.len() < 2 {
        return Err(GenError::TooFewWaypoints(waypoints.len()));
    }

    // ---- GEOMETRY ----

    let points = densify(waypoints, config.point_sep_m);
    let num_points = points.len();

    if num_points < 2 {
        return Err(GenError::ZeroLengthPath);
    }

    // Travel direction of each segment
    let seg_dir_rad: Vec<f64> = points
        .windows(2)
        .map(|pair| {
            let diff = pair[1] - pair[0];
            diff[1].atan2(diff[0])
        })
        .collect();

    // Segment lengths
    let seg_len_m: Vec<f64> = points.windows(2).map(|pair| (pair[1] - pair[0]).norm()).collect();

    // Point headings follow the travel direction (flipped when reversed)
    let headings_rad: Vec<f64> = (0..num_points)
        .map(|i| {
            let dir = seg_dir_rad[i.min(seg_dir_rad.len() - 1)];
            if config.reversed {
                wrap_2pi(dir + std::f64::consts::PI)
            } else {
                wrap_2pi(dir)
            }
        })
        .collect();

    // Curvature from the heading change over arc length, zero at the
    // endpoints. Signed arc length runs negative when reversed, flipping
    // the sign so that `omega = velocity * curvature` holds.
    let curv_sign = if config.reversed { -1.0 } else { 1.0 };
    let curvatures_m: Vec<f64> = (0..num_points)
        .map(|i| {
            if i == 0 || i == num_points - 1 {
                0.0
            } else {
                let dtheta_rad = get_ang_dist_2pi(seg_dir_rad[i - 1], seg_dir_rad[i]);
                let ds_m = (seg_len_m[i - 1] + seg_len_m[i]) / 2.0;
                curv_sign * dtheta_rad / ds_m
            }
        })
        .collect();

    // ---- VELOCITY CEILINGS ----

    // Largest per-actuator speed produced by unit forward velocity at each
    // point's curvature
    let factors: Vec<f64> = curvatures_m
        .iter()
        .map(|curv_m| {
            kin.forward(&ChassisSpeeds {
                vx_ms: 1.0,
                vy_ms: 0.0,
                omega_rads: curv_m.abs(),
            })
            .max_abs_ms()
        })
        .collect();

    let mut vel_cap_ms = vec![config.max_velocity_ms; num_points];

    for i in 0..num_points {
        if factors[i] <= 0.0 {
            continue;
        }

        if let Some(wheel_max_ms) = config.max_wheel_speed_ms {
            vel_cap_ms[i] = vel_cap_ms[i].min(wheel_max_ms / factors[i]);
        }

        if let Some(voltage) = &config.voltage {
            let wheel_vmax_ms = (voltage.max_voltage_v - voltage.ks_v) / voltage.kv_vs_per_m;
            vel_cap_ms[i] = vel_cap_ms[i].min(wheel_vmax_ms / factors[i]);
        }
    }

    // ---- TIME PARAMETERISATION ----

    // Acceleration available at the given velocity, accounting for the
    // voltage headroom already consumed by the velocity feedforward
    let avail_accel = |vel_ms: f64, factor: f64| -> f64 {
        match &config.voltage {
            Some(voltage) if factor > 0.0 => {
                let headroom_v = voltage.max_voltage_v
                    - voltage.ks_v
                    - voltage.kv_vs_per_m * (vel_ms * factor).abs();
                let accel_volt_ms2 = headroom_v / (voltage.ka_vs2_per_m * factor);

                config
                    .max_accel_ms2
                    .min(accel_volt_ms2.max(MIN_ACCEL_FRACTION * config.max_accel_ms2))
            }
            _ => config.max_accel_ms2,
        }
    };

    // Forward accelerating pass from a standing start
    let mut vel_ms = vec![0.0; num_points];
    for i in 1..num_points {
        let accel_ms2 = avail_accel(vel_ms[i - 1], factors[i - 1]);
        let reachable_ms = (vel_ms[i - 1].powi(2) + 2.0 * accel_ms2 * seg_len_m[i - 1]).sqrt();
        vel_ms[i] = vel_cap_ms[i].min(reachable_ms);
    }

    // Backward braking pass to a standing finish
    vel_ms[num_points - 1] = 0.0;
    for i in (0..num_points - 1).rev() {
        let accel_ms2 = avail_accel(vel_ms[i + 1], factors[i + 1]);
        let reachable_ms = (vel_ms[i + 1].powi(2) + 2.0 * accel_ms2 * seg_len_m[i]).sqrt();
        if reachable_ms < vel_ms[i] {
            vel_ms[i] = reachable_ms;
        }
    }

    // Trapezoidal time integration
    let mut time_s = vec![0.0; num_points];
    for i in 1..num_points {
        let avg_vel_ms = (vel_ms[i - 1] + vel_ms[i]) / 2.0;
        if avg_vel_ms <= 1e-9 {
            return Err(GenError::Infeasible(
                "the profile contains an unreachable zero-velocity segment",
            ));
        }
        time_s[i] = time_s[i - 1] + seg_len_m[i - 1] / avg_vel_ms;
    }

    // Per-point acceleration from the velocity profile
    let mut accel_ms2 = vec![0.0; num_points];
    for i in 0..num_points - 1 {
        accel_ms2[i] = (vel_ms[i + 1].powi(2) - vel_ms[i].powi(2)) / (2.0 * seg_len_m[i]);
    }

    // ---- STATE ASSEMBLY ----

    let vel_sign = if config.reversed { -1.0 } else { 1.0 };
    let states = (0..num_points)
        .map(|i| TrajectoryState {
            time_s: time_s[i],
            pose: Pose::new(points[i][0], points[i][1], headings_rad[i]),
            velocity_ms: vel_sign * vel_ms[i],
            accel_ms2: vel_sign * accel_ms2[i],
            curvature_m: curvatures_m[i],
        })
        .collect();

    Ok(Trajectory::new(states)?)
}

/// Generate a straight-line trajectory of the given length from the origin
/// pose.
///
/// Negative lengths drive the path in reverse. Anchor the result at the
/// robot's current pose with [`Trajectory::anchored_at`] to replay it from
/// wherever the robot is.
pub fn straight(
    length_m: f64,
    config: &GenConfig,
    kin: &dyn Kinematics,
) -> Result<Trajectory, GenError> {
    if !length_m.is_finite() || length_m == 0.0 {
        return Err(GenError::ZeroLengthPath);
    }

    let mut config = config.clone();
    config.reversed = length_m < 0.0;

    let waypoints = [Pose::new(0.0, 0.0, 0.0), Pose::new(length_m, 0.0, 0.0)];

    generate(&waypoints, &config, kin)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_point_sep() -> f64 {
    DEFAULT_POINT_SEP_M
}

fn validate_config(config: &GenConfig) -> Result<(), GenError> {
    let positive = [
        ("max_velocity_ms", config.max_velocity_ms),
        ("max_accel_ms2", config.max_accel_ms2),
        ("point_sep_m", config.point_sep_m),
    ];

    for &(name, value) in positive.iter() {
        if !value.is_finite() || value <= 0.0 {
            return Err(GenError::NonPositiveLimit { name, value });
        }
    }

    if let Some(wheel_max_ms) = config.max_wheel_speed_ms {
        if !wheel_max_ms.is_finite() || wheel_max_ms <= 0.0 {
            return Err(GenError::NonPositiveLimit {
                name: "max_wheel_speed_ms",
                value: wheel_max_ms,
            });
        }
    }

    if let Some(voltage) = &config.voltage {
        if voltage.kv_vs_per_m <= 0.0 || voltage.ka_vs2_per_m <= 0.0 {
            return Err(GenError::Infeasible(
                "voltage constraint gains must be positive",
            ));
        }
        if voltage.max_voltage_v <= voltage.ks_v {
            return Err(GenError::Infeasible(
                "voltage constraint leaves no velocity headroom",
            ));
        }
    }

    Ok(())
}

/// Sample the waypoint polyline at regular intervals of at most the point
/// separation, merging coincident waypoints.
fn densify(waypoints: &[Pose], point_sep_m: f64) -> Vec<Vector2<f64>> {
    let mut points = vec![waypoints[0].position_m_lm];
    let mut last = waypoints[0].position_m_lm;

    for waypoint in waypoints.iter().skip(1) {
        let to = waypoint.position_m_lm;
        let diff = to - last;
        let dist_m = diff.norm();

        if dist_m <= POINT_MERGE_EPS_M {
            continue;
        }

        let num_steps = (dist_m / point_sep_m).ceil() as usize;
        for step in 1..=num_steps {
            points.push(last + diff * (step as f64 / num_steps as f64));
        }

        last = to;
    }

    // A two point path has no interior points to carry a non-zero
    // velocity; split it so the profile is feasible
    if points.len() == 2 {
        let mid = (points[0] + points[1]) / 2.0;
        points.insert(1, mid);
    }

    points
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kin::DifferentialKinematics;
    use approx::assert_relative_eq;

    fn config() -> GenConfig {
        GenConfig {
            max_velocity_ms: 1.0,
            max_accel_ms2: 0.5,
            point_sep_m: 0.05,
            reversed: false,
            max_wheel_speed_ms: None,
            voltage: None,
        }
    }

    fn kin() -> DifferentialKinematics {
        DifferentialKinematics::new(0.6).unwrap()
    }

    #[test]
    fn test_straight_line_respects_limits() {
        let traj = generate(
            &[Pose::new(0.0, 0.0, 0.0), Pose::new(3.0, 0.0, 0.0)],
            &config(),
            &kin(),
        )
        .unwrap();

        let states = traj.states();

        // Standing start and finish
        assert_relative_eq!(states[0].velocity_ms, 0.0);
        assert_relative_eq!(states[states.len() - 1].velocity_ms, 0.0);

        for pair in states.windows(2) {
            // Velocity limit respected everywhere
            assert!(pair[0].velocity_ms.abs() <= 1.0 + 1e-9);

            // Acceleration between samples respects the limit
            let ds_m = pair[0].pose.distance_to(&pair[1].pose);
            let accel_ms2 =
                (pair[1].velocity_ms.powi(2) - pair[0].velocity_ms.powi(2)) / (2.0 * ds_m);
            assert!(accel_ms2.abs() <= 0.5 + 1e-9);

            // Time strictly increases
            assert!(pair[1].time_s > pair[0].time_s);
        }
    }

    #[test]
    fn test_wheel_constraint_slows_corners() {
        let waypoints = [
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(1.0, 0.0, 0.0),
            Pose::new(1.5, 0.5, 0.0),
        ];

        let mut cfg = config();
        cfg.max_wheel_speed_ms = Some(0.8);

        let traj = generate(&waypoints, &cfg, &kin()).unwrap();

        // No wheel ever exceeds the constraint
        for state in traj.states() {
            let wheel_factor = 1.0 + state.curvature_m.abs() * 0.3;
            assert!(state.velocity_ms.abs() * wheel_factor <= 0.8 + 1e-6);
        }
    }

    #[test]
    fn test_voltage_constraint_caps_velocity() {
        let mut cfg = config();
        cfg.max_velocity_ms = 10.0;
        // (6 - 1) / 10 = 0.5 m/s achievable
        cfg.voltage = Some(VoltageConstraint {
            ks_v: 1.0,
            kv_vs_per_m: 10.0,
            ka_vs2_per_m: 1.0,
            max_voltage_v: 6.0,
        });

        let traj = generate(
            &[Pose::new(0.0, 0.0, 0.0), Pose::new(3.0, 0.0, 0.0)],
            &cfg,
            &kin(),
        )
        .unwrap();

        for state in traj.states() {
            assert!(state.velocity_ms.abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            generate(&[Pose::new(0.0, 0.0, 0.0)], &config(), &kin()),
            Err(GenError::TooFewWaypoints(1))
        ));

        // Coincident waypoints give a zero length path
        assert!(matches!(
            generate(
                &[Pose::new(1.0, 1.0, 0.0), Pose::new(1.0, 1.0, 0.0)],
                &config(),
                &kin()
            ),
            Err(GenError::ZeroLengthPath)
        ));

        // Colinear and repeated waypoints still generate
        let traj = generate(
            &[
                Pose::new(0.0, 0.0, 0.0),
                Pose::new(1.0, 0.0, 0.0),
                Pose::new(1.0, 0.0, 0.0),
                Pose::new(2.0, 0.0, 0.0),
            ],
            &config(),
            &kin(),
        )
        .unwrap();
        assert!(traj.duration_s() > 0.0);
    }

    #[test]
    fn test_non_positive_limits_rejected() {
        let mut cfg = config();
        cfg.max_velocity_ms = 0.0;

        assert!(matches!(
            generate(
                &[Pose::new(0.0, 0.0, 0.0), Pose::new(1.0, 0.0, 0.0)],
                &cfg,
                &kin()
            ),
            Err(GenError::NonPositiveLimit { .. })
        ));
    }

    #[test]
    fn test_short_path_is_feasible() {
        // Shorter than one point separation
        let traj = generate(
            &[Pose::new(0.0, 0.0, 0.0), Pose::new(0.04, 0.0, 0.0)],
            &config(),
            &kin(),
        )
        .unwrap();

        assert!(traj.duration_s() > 0.0);
    }

    #[test]
    fn test_reversed_straight() {
        let traj = straight(-2.0, &config(), &kin()).unwrap();

        // The path runs to -X but the robot faces +X the whole way
        let last = traj.last();
        assert_relative_eq!(last.pose.position_m_lm[0], -2.0, epsilon = 1e-9);
        assert_relative_eq!(traj.first().pose.get_heading(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(last.pose.get_heading(), 0.0, epsilon = 1e-12);

        // Interior velocities are negative (driving backwards)
        let mid = traj.sample(traj.duration_s() / 2.0);
        assert!(mid.velocity_ms < 0.0);
    }

    #[test]
    fn test_forward_straight_matches_length() {
        let traj = straight(2.5, &config(), &kin()).unwrap();

        assert_relative_eq!(
            traj.last().pose.position_m_lm[0],
            2.5,
            epsilon = 1e-9
        );
        assert!(traj.duration_s() > 0.0);
    }
}
