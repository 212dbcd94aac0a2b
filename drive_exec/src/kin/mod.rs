//! # Kinematics module
//!
//! The kinematics model is the geometric mapping between the velocity of the
//! robot body (chassis speeds) and the velocities of the individual
//! actuators. Two drivetrain variants are supported:
//!
//! - `Differential` - two parallel wheel sets separated by a fixed track
//!   width. Non-holonomic: the body cannot translate laterally.
//! - `Omni` - N independently steered modules at fixed offsets from the
//!   body centre. Holonomic: translation and rotation are independent.
//!
//! The variant is selected at construction time via
//! [`DrivetrainConfig::build`], which returns the model behind the
//! [`Kinematics`] capability trait.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod diff;
mod omni;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use diff::DifferentialKinematics;
pub use omni::OmniKinematics;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity of the robot body expressed in its own frame.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChassisSpeeds {
    /// Forward velocity (along the body X+ axis).
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Lateral velocity (along the body Y+ axis, positive to the left).
    ///
    /// Always zero for differential drivetrains, and ignored by the
    /// differential kinematics model.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Angular velocity about the body Z+ axis (right hand rule, positive
    /// turns to the left).
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

/// Per-wheel velocities for a differential drivetrain.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WheelSpeeds {
    /// Left wheel ground speed.
    ///
    /// Units: meters/second
    pub left_ms: f64,

    /// Right wheel ground speed.
    ///
    /// Units: meters/second
    pub right_ms: f64,
}

/// Per-wheel accelerations for a differential drivetrain.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WheelAccels {
    /// Left wheel acceleration.
    ///
    /// Units: meters/second^2
    pub left_ms2: f64,

    /// Right wheel acceleration.
    ///
    /// Units: meters/second^2
    pub right_ms2: f64,
}

/// Velocity state of a single omni module.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleState {
    /// Module wheel ground speed.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Module steering angle in the body frame.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// Per-actuator velocities for either drivetrain variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ActuatorSpeeds {
    /// Differential drivetrain wheel speeds
    Wheels(WheelSpeeds),

    /// Omni drivetrain module states
    Modules(Vec<ModuleState>),
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur in the kinematics model.
#[derive(Debug, thiserror::Error)]
pub enum KinError {
    #[error("Track width must be positive, got {0}")]
    InvalidTrackWidth(f64),

    #[error("An omni drivetrain requires at least 2 modules, got {0}")]
    TooFewModules(usize),

    #[error("Module positions are degenerate, chassis speeds cannot be recovered")]
    DegenerateGeometry,

    #[error("Expected {expected} module states, got {actual}")]
    ModuleCountMismatch { expected: usize, actual: usize },

    #[error("Actuator speeds do not match the drivetrain (expected {expected}, got {actual})")]
    ActuatorMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Drivetrain geometry selection, loaded from parameter files.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DrivetrainConfig {
    /// Two parallel wheel sets separated by `track_width_m`
    Differential {
        /// Lateral distance between the left and right wheel contact points.
        ///
        /// Units: meters
        track_width_m: f64,
    },

    /// N modules at the given positions in the body frame
    Omni {
        /// Module positions as [x, y] offsets from the body centre.
        ///
        /// Units: meters
        module_pos_m: Vec<[f64; 2]>,
    },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Capability interface over the drivetrain geometry.
///
/// Forward kinematics is a pure function of the geometry: any chassis
/// speeds map to exactly one actuator speed set. Round-tripping physically
/// achievable speeds through `forward` then `inverse` returns the original
/// speeds to within floating point tolerance.
pub trait Kinematics {
    /// Convert chassis speeds into per-actuator speeds.
    fn forward(&self, speeds: &ChassisSpeeds) -> ActuatorSpeeds;

    /// Recover chassis speeds from per-actuator speeds.
    ///
    /// This is the direction used by odometry fusion, which feeds measured
    /// actuator speeds back into a body velocity estimate.
    fn inverse(&self, speeds: &ActuatorSpeeds) -> Result<ChassisSpeeds, KinError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActuatorSpeeds {
    /// Get the largest absolute actuator speed in the set.
    pub fn max_abs_ms(&self) -> f64 {
        match self {
            ActuatorSpeeds::Wheels(w) => w.left_ms.abs().max(w.right_ms.abs()),
            ActuatorSpeeds::Modules(m) => m
                .iter()
                .fold(0f64, |acc, s| acc.max(s.speed_ms.abs())),
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            ActuatorSpeeds::Wheels(_) => "Wheels",
            ActuatorSpeeds::Modules(_) => "Modules",
        }
    }
}

impl DrivetrainConfig {
    /// Build the kinematics model for this drivetrain.
    pub fn build(&self) -> Result<Box<dyn Kinematics>, KinError> {
        match self {
            DrivetrainConfig::Differential { track_width_m } => Ok(Box::new(
                DifferentialKinematics::new(*track_width_m)?,
            )),
            DrivetrainConfig::Omni { module_pos_m } => {
                Ok(Box::new(OmniKinematics::new(module_pos_m.clone())?))
            }
        }
    }

    /// True if the drivetrain can translate and rotate independently.
    pub fn is_holonomic(&self) -> bool {
        matches!(self, DrivetrainConfig::Omni { .. })
    }
}
