//! Differential drivetrain kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{ActuatorSpeeds, ChassisSpeeds, KinError, Kinematics, WheelSpeeds};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of a differential (skid steer) drivetrain: two parallel wheel
/// sets separated by a fixed track width.
#[derive(Debug, Clone)]
pub struct DifferentialKinematics {
    /// Lateral distance between the left and right wheel contact points.
    ///
    /// Units: meters
    track_width_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DifferentialKinematics {
    /// Create a new model with the given track width.
    pub fn new(track_width_m: f64) -> Result<Self, KinError> {
        if !track_width_m.is_finite() || track_width_m <= 0.0 {
            return Err(KinError::InvalidTrackWidth(track_width_m));
        }

        Ok(Self { track_width_m })
    }
}

impl Kinematics for DifferentialKinematics {
    /// Convert chassis speeds into wheel speeds.
    ///
    /// The drivetrain is non-holonomic: the lateral component of the
    /// chassis speeds is ignored.
    fn forward(&self, speeds: &ChassisSpeeds) -> ActuatorSpeeds {
        let half_track_m = self.track_width_m / 2.0;

        ActuatorSpeeds::Wheels(WheelSpeeds {
            left_ms: speeds.vx_ms - speeds.omega_rads * half_track_m,
            right_ms: speeds.vx_ms + speeds.omega_rads * half_track_m,
        })
    }

    fn inverse(&self, speeds: &ActuatorSpeeds) -> Result<ChassisSpeeds, KinError> {
        let wheels = match speeds {
            ActuatorSpeeds::Wheels(w) => w,
            other => {
                return Err(KinError::ActuatorMismatch {
                    expected: "Wheels",
                    actual: other.variant_name(),
                })
            }
        };

        Ok(ChassisSpeeds {
            vx_ms: (wheels.left_ms + wheels.right_ms) / 2.0,
            vy_ms: 0.0,
            omega_rads: (wheels.right_ms - wheels.left_ms) / self.track_width_m,
        })
    }
}
