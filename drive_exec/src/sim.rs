//! # Drivetrain simulation module
//!
//! Provides a simple kinematic simulation which closes the control loop in
//! place of real hardware. The previous cycle's actuator command is
//! converted back into body velocities through the inverse kinematics (the
//! same direction used by odometry fusion on the real robot) and integrated
//! into a pose, which is then supplied as the pose source input for the
//! next cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use crate::cmd::ActuatorCmd;
use crate::kin::{ActuatorSpeeds, ChassisSpeeds, DrivetrainConfig, KinError, Kinematics};
use crate::loc::Pose;
use util::{
    archive::{Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drivetrain simulation module state
#[derive(Default)]
pub struct Sim {
    /// Kinematics model used to invert actuator commands
    kinematics: Option<Box<dyn Kinematics>>,

    /// Current simulated pose
    pose: Pose,

    /// Current simulated body velocity
    chassis_speeds: ChassisSpeeds,

    arch_state: Archiver,
}

/// Parameters for the simulation
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Initial pose as `[x_m, y_m, heading_rad]`
    pub initial_pose: [f64; 3],

    /// Drivetrain geometry used to invert actuator commands
    pub drivetrain: DrivetrainConfig,
}

/// Input data to the simulation.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// The actuator command issued this cycle
    pub cmd: ActuatorCmd,

    /// Integration step, seconds
    pub dt_s: f64,
}

/// Output data from the simulation, read by the control loop as its pose
/// source.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct OutputData {
    /// Simulated pose in the LM frame
    pub pose: Pose,

    /// Simulated body velocity
    pub chassis_speeds: ChassisSpeeds,
}

/// Status report for simulation processing.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Distance travelled this cycle, meters
    pub distance_m: f64,
}

/// Flat record written to the simulation archive.
#[derive(Serialize)]
struct StateRecord {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    vx_ms: f64,
    vy_ms: f64,
    omega_rads: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors during simulation initialisation.
#[derive(Debug, thiserror::Error)]
pub enum SimInitError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Invalid drivetrain configuration: {0}")]
    KinError(#[from] KinError),
}

/// Possible errors during simulation processing.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Simulation processed before being initialised")]
    NotInitialised,

    #[error("Could not invert the actuator command: {0}")]
    KinError(#[from] KinError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Sim {
    /// Current simulated pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Current simulated body velocity.
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.chassis_speeds
    }
}

impl State for Sim {
    type InitData = &'static str;
    type InitError = SimInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SimError;

    /// Initialise the simulation module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let params: Params = match params::load(init_data) {
            Ok(p) => p,
            Err(e) => return Err(SimInitError::ParamLoadError(e)),
        };

        self.kinematics = Some(params.drivetrain.build()?);
        self.pose = Pose::new(
            params.initial_pose[0],
            params.initial_pose[1],
            params.initial_pose[2],
        );
        self.chassis_speeds = ChassisSpeeds::default();

        // Create the arch folder for sim
        let mut arch_path = session.arch_root.clone();
        arch_path.push("sim");
        std::fs::create_dir_all(arch_path).unwrap();

        self.arch_state = Archiver::from_path(session, "sim/state.csv").unwrap();

        Ok(())
    }

    /// Perform cyclic processing of the simulation.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let kinematics = match self.kinematics.as_ref() {
            Some(k) => k,
            None => return Err(SimError::NotInitialised),
        };

        // Recover the body velocity from the actuator command
        let chassis_speeds = match &input_data.cmd {
            ActuatorCmd::Chassis(speeds) => *speeds,
            ActuatorCmd::Stop => ChassisSpeeds::default(),
            ActuatorCmd::Wheels { speeds, .. } => {
                kinematics.inverse(&ActuatorSpeeds::Wheels(*speeds))?
            }
            ActuatorCmd::Modules(modules) => {
                kinematics.inverse(&ActuatorSpeeds::Modules(modules.clone()))?
            }
        };

        // Integrate the body velocity in the LM frame
        let (sin_h, cos_h) = self.pose.get_heading().sin_cos();
        let dt_s = input_data.dt_s;

        self.pose = Pose::new(
            self.pose.position_m_lm[0]
                + (cos_h * chassis_speeds.vx_ms - sin_h * chassis_speeds.vy_ms) * dt_s,
            self.pose.position_m_lm[1]
                + (sin_h * chassis_speeds.vx_ms + cos_h * chassis_speeds.vy_ms) * dt_s,
            self.pose.get_heading() + chassis_speeds.omega_rads * dt_s,
        );
        self.chassis_speeds = chassis_speeds;

        trace!(
            "Sim pose: ({:.3}, {:.3}, {:.3})",
            self.pose.position_m_lm[0],
            self.pose.position_m_lm[1],
            self.pose.get_heading()
        );

        let output = OutputData {
            pose: self.pose,
            chassis_speeds: self.chassis_speeds,
        };

        let report = StatusReport {
            distance_m: chassis_speeds.vx_ms.hypot(chassis_speeds.vy_ms) * dt_s,
        };

        Ok((output, report))
    }
}

impl Archived for Sim {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_state.serialise(StateRecord {
            x_m: self.pose.position_m_lm[0],
            y_m: self.pose.position_m_lm[1],
            heading_rad: self.pose.get_heading(),
            vx_ms: self.chassis_speeds.vx_ms,
            vy_ms: self.chassis_speeds.vy_ms,
            omega_rads: self.chassis_speeds.omega_rads,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kin::WheelSpeeds;
    use approx::assert_relative_eq;

    fn sim() -> Sim {
        let drivetrain = DrivetrainConfig::Differential { track_width_m: 0.6 };

        Sim {
            kinematics: Some(drivetrain.build().unwrap()),
            pose: Pose::new(0.0, 0.0, 0.0),
            chassis_speeds: ChassisSpeeds::default(),
            arch_state: Archiver::default(),
        }
    }

    #[test]
    fn test_straight_drive_integrates() {
        let mut sim = sim();

        let input = InputData {
            cmd: ActuatorCmd::Wheels {
                speeds: WheelSpeeds {
                    left_ms: 1.0,
                    right_ms: 1.0,
                },
                accels: Default::default(),
            },
            dt_s: 0.5,
        };

        let (output, report) = sim.proc(&input).unwrap();

        assert_relative_eq!(output.pose.position_m_lm[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(output.chassis_speeds.vx_ms, 1.0);
        assert_relative_eq!(report.distance_m, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_stop_zeroes_velocity() {
        let mut sim = sim();

        let (output, _) = sim
            .proc(&InputData {
                cmd: ActuatorCmd::Stop,
                dt_s: 0.02,
            })
            .unwrap();

        assert_relative_eq!(output.chassis_speeds.vx_ms, 0.0);
        assert_relative_eq!(output.pose.position_m_lm[0], 0.0);
    }

    #[test]
    fn test_uninitialised_is_an_error() {
        let mut sim = Sim::default();

        assert!(sim
            .proc(&InputData {
                cmd: ActuatorCmd::Stop,
                dt_s: 0.02,
            })
            .is_err());
    }
}
