//! Commands passed to the actuator interface

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::kin::{ActuatorSpeeds, ChassisSpeeds, ModuleState, WheelAccels, WheelSpeeds};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command to be executed by the drive actuators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ActuatorCmd {
    /// Per-wheel velocity and acceleration setpoints for a differential
    /// drivetrain. The accelerations are used for per-wheel feedforward.
    Wheels {
        speeds: WheelSpeeds,
        accels: WheelAccels,
    },

    /// Per-module velocity setpoints for an omni drivetrain.
    Modules(Vec<ModuleState>),

    /// A raw chassis-frame command, applied without kinematic conversion by
    /// this system. Used for teleoperated passthrough.
    Chassis(ChassisSpeeds),

    /// Bring the robot to a full stop, zeroing all actuator rates.
    ///
    /// Stop shall never fail and must always bring the robot to a full and
    /// complete stop.
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActuatorCmd {
    /// Build a zero-velocity, zero-acceleration command with the same
    /// actuator shape as the given speeds.
    ///
    /// Module steering angles are preserved so a zero command does not slew
    /// the steering.
    pub fn zeroed_like(speeds: &ActuatorSpeeds) -> Self {
        match speeds {
            ActuatorSpeeds::Wheels(_) => ActuatorCmd::Wheels {
                speeds: WheelSpeeds::default(),
                accels: WheelAccels::default(),
            },
            ActuatorSpeeds::Modules(m) => ActuatorCmd::Modules(
                m.iter()
                    .map(|s| ModuleState {
                        speed_ms: 0.0,
                        angle_rad: s.angle_rad,
                    })
                    .collect(),
            ),
        }
    }
}

impl Default for ActuatorCmd {
    fn default() -> Self {
        ActuatorCmd::Stop
    }
}
