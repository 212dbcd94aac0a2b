//! # Drive manager module
//!
//! The drive manager owns the per-tick orchestration of the drive system.
//! It arbitrates control authority between the operator and the autonomous
//! system, runs the trajectory tracking controller, converts body
//! velocities into actuator commands through the kinematics model, and
//! detects completion of the autonomous operation.
//!
//! The manager is a single state machine over three modes:
//!
//! - `Teleop` - the raw operator command is passed through to the
//!   actuators. The external teleop signal forces this mode
//!   unconditionally, at any time, regardless of autonomous progress.
//! - `Auto` - the current operation (trajectory follow or in-place turn)
//!   is executed: sample the trajectory at the elapsed time, run the
//!   feedback controller, convert through the kinematics model.
//! - `Done` - terminal for the current run, zero output is commanded every
//!   tick until a new operation or a teleop signal supersedes it.
//!
//! Completion of a trajectory requires both convergence (`at_reference`)
//! and the nominal duration to have elapsed. Time alone is insufficient
//! because the controller may still be converging; convergence alone is
//! insufficient because a slow-moving robot could appear at-reference early
//! on a path that loops back near its start.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
pub mod tm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;

// Internal
pub use params::Params;
pub use tm::DriveTm;

use crate::cmd::ActuatorCmd;
use crate::ctrl::{HolonomicCtrl, ProfiledPidController, RamseteCtrl};
use crate::kin::{
    ActuatorSpeeds, ChassisSpeeds, DrivetrainConfig, Kinematics, WheelAccels,
};
use crate::loc::Pose;
use crate::traj::Trajectory;
use util::maths::{get_ang_dist_2pi, wrap_2pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive manager state.
pub struct DriveMgr {
    params: Params,

    /// Kinematics model matching the configured drivetrain
    kinematics: Box<dyn Kinematics>,

    /// Trajectory controller matching the configured drivetrain
    follower: Follower,

    /// Executing mode
    mode: DriveMode,

    /// Runtime state of the current autonomous run, `None` outside of one
    auto: Option<AutoState>,

    report: StatusReport,
}

/// Input data to the drive manager, read from the collaborators once per
/// tick.
#[derive(Debug, Clone)]
pub struct InputData {
    /// Current time, seconds. Used to index the trajectory and for the
    /// finite-difference acceleration estimate.
    pub time_s: f64,

    /// Latest pose from the pose source
    pub pose: Pose,

    /// Latest measured body velocity from the pose source
    pub chassis_speeds: ChassisSpeeds,

    /// True while the operator holds control authority
    pub teleop: bool,

    /// Raw operator command, passed through to the actuators in teleop
    pub operator_cmd: ChassisSpeeds,
}

/// The status report containing monitoring quantities and the telemetry
/// packet for this tick.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Mode after this tick's processing
    pub mode: DriveMode,

    /// True if the controller errors are within tolerance
    pub at_reference: bool,

    /// True on the tick the autonomous operation completed
    pub op_finished: bool,

    /// Distance to the reference, meters
    pub pos_error_m: f64,

    /// Signed heading error, radians
    pub head_error_rad: f64,

    /// Elapsed time of the autonomous operation, seconds
    pub elapsed_s: f64,

    /// Telemetry packet, produced every tick regardless of mode
    pub tm: DriveTm,
}

/// Runtime state owned by the current autonomous run.
///
/// Created when an operation starts, mutated once per tick, discarded when
/// the run ends.
struct AutoState {
    op: AutoOp,

    /// Time the operation started, seconds
    start_time_s: f64,

    /// Desired heading for holonomic following. Decoupled from the path
    /// tangent so the robot can face a separate target while translating.
    target_heading_rad: f64,

    /// Profiled controller driving in-place turns
    turn_ctrl: ProfiledPidController,

    /// Previous tick time and commanded actuator speeds, used for the
    /// finite-difference acceleration estimate. `None` until the first
    /// tick of the run has been processed.
    prev: Option<PrevTick>,
}

struct PrevTick {
    time_s: f64,
    speeds: ActuatorSpeeds,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Executing mode of the drive manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriveMode {
    Teleop,
    Auto,
    Done,
}

/// An autonomous operation executed under [`DriveMode::Auto`].
#[derive(Debug, Clone)]
pub enum AutoOp {
    /// Follow a time-parameterised trajectory
    Follow(Trajectory),

    /// Rotate on the spot to the target heading
    TurnInPlace {
        /// Units: radians
        target_heading_rad: f64,
    },
}

/// Trajectory controller variant, matched to the drivetrain at
/// construction rather than inspected at runtime.
enum Follower {
    /// Nonlinear unicycle law for the non-holonomic differential base
    Ramsete(RamseteCtrl),

    /// Decoupled translation and profiled heading for the omni base
    Holonomic(HolonomicCtrl),
}

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum DriveMgrError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid drivetrain configuration: {0}")]
    KinError(#[from] crate::kin::KinError),

    /// The manager was in Auto without an operation set. This is a logic
    /// error in the orchestrating layer, not a recoverable condition.
    #[error("Autonomous mode entered without an operation set")]
    NoOperation,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveMgr {
    /// Initialise the drive manager.
    ///
    /// Expected init data is a path to the parameter file.
    pub fn init(params_path: &str) -> Result<Self, DriveMgrError> {
        let params = match util::params::load(params_path) {
            Ok(p) => p,
            Err(e) => return Err(DriveMgrError::ParamLoadError(e)),
        };

        Self::with_params(params)
    }

    /// Build the manager from already loaded parameters.
    pub fn with_params(params: Params) -> Result<Self, DriveMgrError> {
        let kinematics = params.drivetrain.build()?;

        // The controller variant follows the drivetrain: the nonlinear
        // unicycle law for the non-holonomic base, the decoupled holonomic
        // controller otherwise
        let follower = match &params.drivetrain {
            DrivetrainConfig::Differential { .. } => Follower::Ramsete(RamseteCtrl::new(
                params.ramsete_b,
                params.ramsete_zeta,
                params.pos_tol_m,
                params.head_tol_rad,
            )),
            DrivetrainConfig::Omni { .. } => Follower::Holonomic(HolonomicCtrl::new(
                (params.pos_k_p, params.pos_k_i, params.pos_k_d),
                (params.head_k_p, params.head_k_i, params.head_k_d),
                params.head_max_vel_rads,
                params.head_max_acc_rads2,
                params.pos_tol_m,
                params.head_tol_rad,
            )),
        };

        Ok(Self {
            params,
            kinematics,
            follower,
            mode: DriveMode::Teleop,
            auto: None,
            report: StatusReport::default(),
        })
    }

    /// Begin executing a new trajectory.
    ///
    /// This resets the runtime state of any previous run, sets the start
    /// time to `now_s` and moves to Auto. Execution begins on the next call
    /// to `proc`. The desired heading for holonomic following defaults to
    /// the heading of the final trajectory pose and may be overridden with
    /// [`DriveMgr::set_target_heading`].
    pub fn set_trajectory(&mut self, trajectory: Trajectory, now_s: f64) {
        let target_heading_rad = trajectory.last().pose.get_heading();

        info!(
            "New trajectory of {:.2} s / {} states, entering Auto",
            trajectory.duration_s(),
            trajectory.num_states()
        );

        self.begin_op(AutoOp::Follow(trajectory), target_heading_rad, now_s);
    }

    /// Begin an in-place rotation to the given heading.
    pub fn set_turn_in_place(&mut self, target_heading_rad: f64, now_s: f64) {
        let target_heading_rad = wrap_2pi(target_heading_rad);

        info!(
            "New in-place turn to {:.3} rad, entering Auto",
            target_heading_rad
        );

        self.begin_op(
            AutoOp::TurnInPlace { target_heading_rad },
            target_heading_rad,
            now_s,
        );
    }

    /// Override the desired heading of the current autonomous run.
    ///
    /// Only meaningful for holonomic drivetrains, which can face a target
    /// independently of their direction of travel.
    pub fn set_target_heading(&mut self, heading_rad: f64) {
        if let Some(auto) = self.auto.as_mut() {
            auto.target_heading_rad = wrap_2pi(heading_rad);
        }
    }

    /// Abort the current autonomous operation.
    ///
    /// The mode moves to Done, so the next call to `proc` commands zero
    /// output. Call before `proc` to stop within the same tick.
    pub fn abort(&mut self) {
        if self.mode == DriveMode::Auto {
            info!("Autonomous operation aborted");
            self.mode = DriveMode::Done;
            self.auto = None;
        }
    }

    /// Current executing mode.
    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    /// True once the current autonomous operation has completed.
    pub fn is_finished(&self) -> bool {
        self.mode == DriveMode::Done
    }

    /// Elapsed time of the current autonomous operation, or zero if no
    /// operation is active.
    pub fn trajectory_elapsed(&self, now_s: f64) -> f64 {
        match &self.auto {
            Some(auto) => now_s - auto.start_time_s,
            None => 0.0,
        }
    }

    /// Perform per-tick processing of the drive manager.
    ///
    /// Processing involves:
    ///  1. Arbitrating control authority (the teleop signal always wins).
    ///  2. Executing the mode: passthrough, trajectory tracking, or holding
    ///     zero output.
    ///  3. Producing the telemetry packet for this tick.
    pub fn proc(
        &mut self,
        input: &InputData,
    ) -> Result<(ActuatorCmd, StatusReport), DriveMgrError> {
        self.report = StatusReport::default();

        // Operator override wins unconditionally: drop the autonomous run
        // on the same tick so no stale motion command survives
        if input.teleop && self.mode != DriveMode::Teleop {
            info!("Teleop signal received, dropping autonomous operation");
            self.mode = DriveMode::Teleop;
            self.auto = None;
        }

        let actuator_cmd = match self.mode {
            DriveMode::Teleop => ActuatorCmd::Chassis(input.operator_cmd),
            DriveMode::Auto => self.step_auto(input)?,
            DriveMode::Done => ActuatorCmd::Stop,
        };

        self.report.mode = self.mode;
        self.report.tm = DriveTm {
            mode: self.mode.to_string(),
            x_m: input.pose.position_m_lm[0],
            y_m: input.pose.position_m_lm[1],
            heading_rad: input.pose.get_heading(),
            vx_ms: input.chassis_speeds.vx_ms,
            vy_ms: input.chassis_speeds.vy_ms,
            omega_rads: input.chassis_speeds.omega_rads,
            elapsed_s: self.report.elapsed_s,
            pos_error_m: self.report.pos_error_m,
            head_error_rad: self.report.head_error_rad,
        };

        Ok((actuator_cmd, self.report.clone()))
    }

    /// Execute one tick of the current autonomous operation.
    fn step_auto(&mut self, input: &InputData) -> Result<ActuatorCmd, DriveMgrError> {
        let auto = match self.auto.as_mut() {
            Some(a) => a,
            None => return Err(DriveMgrError::NoOperation),
        };

        let elapsed_s = input.time_s - auto.start_time_s;
        self.report.elapsed_s = elapsed_s;

        match auto.op {
            AutoOp::Follow(ref trajectory) => {
                let (prev_time_s, prev_speeds) = match auto.prev.take() {
                    Some(prev) => (prev.time_s, prev.speeds),
                    None => {
                        // First tick of the run: there is no previous
                        // sample to difference against, so emit zero
                        // velocity and zero acceleration, prime the
                        // controllers and remember this tick
                        match &mut self.follower {
                            Follower::Ramsete(ctrl) => ctrl.reset(),
                            Follower::Holonomic(ctrl) => ctrl.reset(&input.pose),
                        }

                        let initial = trajectory.sample(0.0);
                        let speeds = self.kinematics.forward(&ChassisSpeeds {
                            vx_ms: initial.velocity_ms,
                            vy_ms: 0.0,
                            omega_rads: initial.velocity_ms * initial.curvature_m,
                        });

                        let cmd = ActuatorCmd::zeroed_like(&speeds);
                        auto.prev = Some(PrevTick {
                            time_s: input.time_s,
                            speeds,
                        });

                        return Ok(cmd);
                    }
                };

                let dt_s = input.time_s - prev_time_s;
                let reference = trajectory.sample(elapsed_s);

                // Feedback correction plus trajectory feedforward
                let chassis_cmd = match &mut self.follower {
                    Follower::Ramsete(ctrl) => ctrl.calculate(&input.pose, &reference),
                    Follower::Holonomic(ctrl) => ctrl.calculate(
                        &input.pose,
                        &reference,
                        auto.target_heading_rad,
                        dt_s,
                    ),
                };

                let target = self.kinematics.forward(&chassis_cmd);
                let cmd = cmd_with_accels(&target, &prev_speeds, dt_s);

                let (at_reference, pos_error_m, head_error_rad) = match &self.follower {
                    Follower::Ramsete(ctrl) => {
                        (ctrl.at_reference(), ctrl.pos_error_m(), ctrl.head_error_rad())
                    }
                    Follower::Holonomic(ctrl) => {
                        (ctrl.at_reference(), ctrl.pos_error_m(), ctrl.head_error_rad())
                    }
                };

                self.report.at_reference = at_reference;
                self.report.pos_error_m = pos_error_m;
                self.report.head_error_rad = head_error_rad;

                // Completion requires both convergence and the nominal
                // duration to have elapsed
                if at_reference && elapsed_s >= trajectory.duration_s() {
                    info!("Trajectory complete after {:.2} s", elapsed_s);
                    self.report.op_finished = true;
                    self.mode = DriveMode::Done;
                    return Ok(ActuatorCmd::Stop);
                }

                auto.prev = Some(PrevTick {
                    time_s: input.time_s,
                    speeds: target,
                });

                Ok(cmd)
            }

            AutoOp::TurnInPlace { target_heading_rad } => {
                let (prev_time_s, prev_speeds) = match auto.prev.take() {
                    Some(prev) => (prev.time_s, prev.speeds),
                    None => {
                        auto.turn_ctrl.reset(input.pose.get_heading());

                        let speeds = self.kinematics.forward(&ChassisSpeeds::default());
                        let cmd = ActuatorCmd::zeroed_like(&speeds);
                        auto.prev = Some(PrevTick {
                            time_s: input.time_s,
                            speeds,
                        });

                        return Ok(cmd);
                    }
                };

                let dt_s = input.time_s - prev_time_s;

                let omega_rads =
                    auto.turn_ctrl
                        .update(target_heading_rad, input.pose.get_heading(), dt_s);

                let head_error_rad =
                    get_ang_dist_2pi(input.pose.get_heading(), target_heading_rad);
                self.report.head_error_rad = head_error_rad;
                self.report.at_reference =
                    head_error_rad.abs() < self.params.head_tol_rad;

                if self.report.at_reference && auto.turn_ctrl.is_settled() {
                    info!("In-place turn complete after {:.2} s", elapsed_s);
                    self.report.op_finished = true;
                    self.mode = DriveMode::Done;
                    return Ok(ActuatorCmd::Stop);
                }

                let target = self.kinematics.forward(&ChassisSpeeds {
                    vx_ms: 0.0,
                    vy_ms: 0.0,
                    omega_rads,
                });
                let cmd = cmd_with_accels(&target, &prev_speeds, dt_s);

                auto.prev = Some(PrevTick {
                    time_s: input.time_s,
                    speeds: target,
                });

                Ok(cmd)
            }
        }
    }

    fn begin_op(&mut self, op: AutoOp, target_heading_rad: f64, now_s: f64) {
        self.auto = Some(AutoState {
            op,
            start_time_s: now_s,
            target_heading_rad,
            turn_ctrl: ProfiledPidController::new(
                self.params.head_k_p,
                self.params.head_k_i,
                self.params.head_k_d,
                self.params.head_max_vel_rads,
                self.params.head_max_acc_rads2,
            ),
            prev: None,
        });
        self.mode = DriveMode::Auto;
    }
}

impl Default for DriveMode {
    fn default() -> Self {
        DriveMode::Teleop
    }
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveMode::Teleop => write!(f, "TELEOP"),
            DriveMode::Auto => write!(f, "AUTO"),
            DriveMode::Done => write!(f, "DONE"),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the actuator command for the target speeds, estimating
/// accelerations by finite difference against the previous tick.
fn cmd_with_accels(
    target: &ActuatorSpeeds,
    prev_speeds: &ActuatorSpeeds,
    dt_s: f64,
) -> ActuatorCmd {
    match (target, prev_speeds) {
        (ActuatorSpeeds::Wheels(wheels), ActuatorSpeeds::Wheels(prev)) if dt_s > 0.0 => {
            ActuatorCmd::Wheels {
                speeds: *wheels,
                accels: WheelAccels {
                    left_ms2: (wheels.left_ms - prev.left_ms) / dt_s,
                    right_ms2: (wheels.right_ms - prev.right_ms) / dt_s,
                },
            }
        }
        (ActuatorSpeeds::Wheels(wheels), _) => ActuatorCmd::Wheels {
            speeds: *wheels,
            accels: WheelAccels::default(),
        },
        (ActuatorSpeeds::Modules(modules), _) => ActuatorCmd::Modules(modules.clone()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj::TrajectoryState;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const DT_S: f64 = 0.02;

    fn diff_params() -> Params {
        Params {
            drivetrain: DrivetrainConfig::Differential { track_width_m: 0.6 },
            pos_k_p: 1.0,
            pos_k_i: 0.0,
            pos_k_d: 0.0,
            head_k_p: 4.0,
            head_k_i: 0.0,
            head_k_d: 0.0,
            head_max_vel_rads: 6.0,
            head_max_acc_rads2: 3.0,
            ramsete_b: 2.0,
            ramsete_zeta: 0.7,
            pos_tol_m: 0.05,
            head_tol_rad: 0.1,
        }
    }

    fn omni_params() -> Params {
        Params {
            drivetrain: DrivetrainConfig::Omni {
                module_pos_m: vec![[0.3, 0.3], [0.3, -0.3], [-0.3, 0.3], [-0.3, -0.3]],
            },
            ..diff_params()
        }
    }

    /// Straight 2 second segment from (0,0,0) to (4,0,0) at 2 m/s.
    fn straight_traj() -> Trajectory {
        Trajectory::new(vec![
            TrajectoryState {
                time_s: 0.0,
                pose: Pose::new(0.0, 0.0, 0.0),
                velocity_ms: 2.0,
                accel_ms2: 0.0,
                curvature_m: 0.0,
            },
            TrajectoryState {
                time_s: 2.0,
                pose: Pose::new(4.0, 0.0, 0.0),
                velocity_ms: 2.0,
                accel_ms2: 0.0,
                curvature_m: 0.0,
            },
        ])
        .unwrap()
    }

    fn input(time_s: f64, pose: Pose) -> InputData {
        InputData {
            time_s,
            pose,
            chassis_speeds: ChassisSpeeds::default(),
            teleop: false,
            operator_cmd: ChassisSpeeds::default(),
        }
    }

    #[test]
    fn test_first_tick_emits_zero() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 10.0);

        let (cmd, rpt) = mgr.proc(&input(10.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        assert_eq!(rpt.mode, DriveMode::Auto);
        match cmd {
            ActuatorCmd::Wheels { speeds, accels } => {
                assert_relative_eq!(speeds.left_ms, 0.0);
                assert_relative_eq!(speeds.right_ms, 0.0);
                assert_relative_eq!(accels.left_ms2, 0.0);
                assert_relative_eq!(accels.right_ms2, 0.0);
            }
            other => panic!("expected wheel command, got {:?}", other),
        }
    }

    #[test]
    fn test_second_tick_accels_finite() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);

        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        let (cmd, _) = mgr
            .proc(&input(DT_S, Pose::new(2.0 * DT_S, 0.0, 0.0)))
            .unwrap();

        match cmd {
            ActuatorCmd::Wheels { speeds, accels } => {
                assert!(speeds.left_ms.is_finite());
                assert!(accels.left_ms2.is_finite());
                assert!(accels.right_ms2.is_finite());
                // On-path tracking commands the nominal speed
                assert_relative_eq!(speeds.left_ms, 2.0, epsilon = 1e-6);
                assert_relative_eq!(speeds.right_ms, 2.0, epsilon = 1e-6);
            }
            other => panic!("expected wheel command, got {:?}", other),
        }
    }

    #[test]
    fn test_teleop_override_passthrough() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        // Mid trajectory the operator takes over: the very next command is
        // the raw operator command, with no autonomous residue
        let operator_cmd = ChassisSpeeds {
            vx_ms: 0.5,
            vy_ms: 0.0,
            omega_rads: 0.1,
        };
        let mut teleop_input = input(1.0, Pose::new(2.0, 0.0, 0.0));
        teleop_input.teleop = true;
        teleop_input.operator_cmd = operator_cmd;

        let (cmd, rpt) = mgr.proc(&teleop_input).unwrap();

        assert_eq!(rpt.mode, DriveMode::Teleop);
        assert_eq!(cmd, ActuatorCmd::Chassis(operator_cmd));
    }

    #[test]
    fn test_completion_requires_convergence() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        // Far past the nominal duration but the robot never left the
        // start: the run must not report done on time alone
        let (cmd, rpt) = mgr.proc(&input(3.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        assert_eq!(rpt.mode, DriveMode::Auto);
        assert!(!rpt.op_finished);
        assert!(cmd != ActuatorCmd::Stop);
    }

    #[test]
    fn test_completion_requires_elapsed_time() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        // Perfectly on the reference early in the run: convergence alone
        // must not complete the trajectory
        let reference = straight_traj().sample(1.0);
        let (_, rpt) = mgr.proc(&input(1.0, reference.pose)).unwrap();

        assert_eq!(rpt.mode, DriveMode::Auto);
        assert!(rpt.at_reference);
        assert!(!rpt.op_finished);
    }

    #[test]
    fn test_completion_and_done_holds_stop() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        // Past the duration and on the final pose: both criteria met
        let (cmd, rpt) = mgr.proc(&input(2.1, Pose::new(4.0, 0.0, 0.0))).unwrap();

        assert!(rpt.op_finished);
        assert_eq!(rpt.mode, DriveMode::Done);
        assert_eq!(cmd, ActuatorCmd::Stop);

        // Done holds zero output on subsequent ticks
        let (cmd, rpt) = mgr.proc(&input(2.2, Pose::new(4.0, 0.0, 0.0))).unwrap();
        assert_eq!(rpt.mode, DriveMode::Done);
        assert_eq!(cmd, ActuatorCmd::Stop);
    }

    #[test]
    fn test_zero_tolerances_never_complete() {
        let mut params = diff_params();
        params.pos_tol_m = 0.0;
        params.head_tol_rad = 0.0;

        let mut mgr = DriveMgr::with_params(params).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        // Perfect tracking past the duration, but unset tolerances must
        // never declare the reference reached
        let (_, rpt) = mgr.proc(&input(2.5, Pose::new(4.0, 0.0, 0.0))).unwrap();

        assert!(!rpt.at_reference);
        assert_eq!(rpt.mode, DriveMode::Auto);
    }

    #[test]
    fn test_new_trajectory_after_done_reenters_auto() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();
        mgr.proc(&input(2.1, Pose::new(4.0, 0.0, 0.0))).unwrap();
        assert_eq!(mgr.mode(), DriveMode::Done);

        mgr.set_trajectory(straight_traj(), 3.0);
        assert_eq!(mgr.mode(), DriveMode::Auto);

        let (_, rpt) = mgr.proc(&input(3.0, Pose::new(4.0, 0.0, 0.0))).unwrap();
        assert_eq!(rpt.mode, DriveMode::Auto);
    }

    #[test]
    fn test_omni_trajectory_commands_modules() {
        let mut mgr = DriveMgr::with_params(omni_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        let (cmd, _) = mgr
            .proc(&input(DT_S, Pose::new(2.0 * DT_S, 0.0, 0.0)))
            .unwrap();

        match cmd {
            ActuatorCmd::Modules(modules) => {
                assert_eq!(modules.len(), 4);
                for module in &modules {
                    assert!(module.speed_ms.is_finite());
                }
            }
            other => panic!("expected module command, got {:?}", other),
        }
    }

    #[test]
    fn test_turn_in_place_completes() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_turn_in_place(FRAC_PI_2, 0.0);

        let kin = crate::kin::DifferentialKinematics::new(0.6).unwrap();

        let mut heading_rad = 0f64;
        let mut time_s = 0f64;
        let mut done = false;

        for _ in 0..2000 {
            let (cmd, rpt) = mgr
                .proc(&input(time_s, Pose::new(0.0, 0.0, heading_rad)))
                .unwrap();

            if rpt.mode == DriveMode::Done {
                done = true;
                break;
            }

            // Integrate the commanded turn rate as a perfect drivetrain
            if let ActuatorCmd::Wheels { speeds, .. } = cmd {
                let chassis = kin
                    .inverse(&crate::kin::ActuatorSpeeds::Wheels(speeds))
                    .unwrap();

                // An in-place turn never commands translation
                assert_relative_eq!(chassis.vx_ms, 0.0, epsilon = 1e-9);

                heading_rad += chassis.omega_rads * DT_S;
            }

            time_s += DT_S;
        }

        assert!(done, "turn did not complete");
        assert_relative_eq!(heading_rad, FRAC_PI_2, epsilon = 0.1);
    }

    #[test]
    fn test_abort_commands_stop() {
        let mut mgr = DriveMgr::with_params(diff_params()).unwrap();
        mgr.set_trajectory(straight_traj(), 0.0);
        mgr.proc(&input(0.0, Pose::new(0.0, 0.0, 0.0))).unwrap();

        mgr.abort();

        let (cmd, rpt) = mgr.proc(&input(0.5, Pose::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(rpt.mode, DriveMode::Done);
        assert_eq!(cmd, ActuatorCmd::Stop);
    }
}
