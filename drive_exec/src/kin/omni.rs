//! Omnidirectional (N-module) drivetrain kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix3, Vector2, Vector3};

// Internal
use super::{ActuatorSpeeds, ChassisSpeeds, KinError, Kinematics, ModuleState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of an omnidirectional drivetrain with N independently steered
/// modules at fixed offsets from the body centre.
///
/// Forward kinematics gives each module the vector velocity
/// `v_module = v_chassis + omega x r_module`. The inverse is the
/// least-squares recovery of the chassis twist from the N module velocity
/// vectors, solved through the 3x3 normal equations. The normal matrix
/// depends only on the geometry, so its inverse is computed once at
/// construction.
#[derive(Debug, Clone)]
pub struct OmniKinematics {
    /// Module positions in the body frame.
    ///
    /// Units: meters
    module_pos_m: Vec<Vector2<f64>>,

    /// Inverse of the normal matrix (A^T A)^-1 of the module equations.
    normal_inv: Matrix3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OmniKinematics {
    /// Create a new model from the module positions.
    ///
    /// At least two modules at distinct positions are required, otherwise
    /// the chassis twist cannot be recovered from module speeds.
    pub fn new(module_pos_m: Vec<[f64; 2]>) -> Result<Self, KinError> {
        if module_pos_m.len() < 2 {
            return Err(KinError::TooFewModules(module_pos_m.len()));
        }

        let module_pos_m: Vec<Vector2<f64>> = module_pos_m
            .iter()
            .map(|p| Vector2::new(p[0], p[1]))
            .collect();

        // Each module contributes the rows [1, 0, -ry] and [0, 1, rx] to
        // the system A * (vx, vy, omega) = v_modules. Accumulate A^T A.
        let mut normal = Matrix3::<f64>::zeros();
        for pos in &module_pos_m {
            let (rx, ry) = (pos[0], pos[1]);

            normal[(0, 0)] += 1.0;
            normal[(0, 2)] += -ry;
            normal[(1, 1)] += 1.0;
            normal[(1, 2)] += rx;
            normal[(2, 0)] += -ry;
            normal[(2, 1)] += rx;
            normal[(2, 2)] += rx * rx + ry * ry;
        }

        let normal_inv = match normal.try_inverse() {
            Some(inv) => inv,
            None => return Err(KinError::DegenerateGeometry),
        };

        Ok(Self {
            module_pos_m,
            normal_inv,
        })
    }

    /// Number of modules in the drivetrain.
    pub fn num_modules(&self) -> usize {
        self.module_pos_m.len()
    }
}

impl Kinematics for OmniKinematics {
    fn forward(&self, speeds: &ChassisSpeeds) -> ActuatorSpeeds {
        let states = self
            .module_pos_m
            .iter()
            .map(|pos| {
                let vx_ms = speeds.vx_ms - speeds.omega_rads * pos[1];
                let vy_ms = speeds.vy_ms + speeds.omega_rads * pos[0];

                ModuleState {
                    speed_ms: vx_ms.hypot(vy_ms),
                    angle_rad: vy_ms.atan2(vx_ms),
                }
            })
            .collect();

        ActuatorSpeeds::Modules(states)
    }

    fn inverse(&self, speeds: &ActuatorSpeeds) -> Result<ChassisSpeeds, KinError> {
        let modules = match speeds {
            ActuatorSpeeds::Modules(m) => m,
            other => {
                return Err(KinError::ActuatorMismatch {
                    expected: "Modules",
                    actual: other.variant_name(),
                })
            }
        };

        if modules.len() != self.module_pos_m.len() {
            return Err(KinError::ModuleCountMismatch {
                expected: self.module_pos_m.len(),
                actual: modules.len(),
            });
        }

        // Accumulate A^T b for the measured module velocity vectors
        let mut atb = Vector3::<f64>::zeros();
        for (state, pos) in modules.iter().zip(self.module_pos_m.iter()) {
            let vx_ms = state.speed_ms * state.angle_rad.cos();
            let vy_ms = state.speed_ms * state.angle_rad.sin();

            atb[0] += vx_ms;
            atb[1] += vy_ms;
            atb[2] += -pos[1] * vx_ms + pos[0] * vy_ms;
        }

        let twist = self.normal_inv * atb;

        Ok(ChassisSpeeds {
            vx_ms: twist[0],
            vy_ms: twist[1],
            omega_rads: twist[2],
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::SQRT_2;

    fn square_modules() -> OmniKinematics {
        OmniKinematics::new(vec![
            [0.3, 0.3],
            [0.3, -0.3],
            [-0.3, 0.3],
            [-0.3, -0.3],
        ])
        .unwrap()
    }

    #[test]
    fn test_forward_pure_rotation() {
        let kin = square_modules();

        let states = match kin.forward(&ChassisSpeeds {
            vx_ms: 0.0,
            vy_ms: 0.0,
            omega_rads: 1.0,
        }) {
            ActuatorSpeeds::Modules(m) => m,
            _ => panic!("expected module states"),
        };

        // All modules move tangentially at omega * |r|
        for state in &states {
            assert_relative_eq!(state.speed_ms, 0.3 * SQRT_2, epsilon = 1e-12);
        }

        // Front-left module (0.3, 0.3) moves in the (-ry, rx) direction
        assert_relative_eq!(
            states[0].angle_rad,
            (0.3f64).atan2(-0.3),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_round_trip() {
        let kin = square_modules();

        let speeds = ChassisSpeeds {
            vx_ms: 1.0,
            vy_ms: 0.5,
            omega_rads: -0.7,
        };

        let recovered = kin.inverse(&kin.forward(&speeds)).unwrap();

        assert_relative_eq!(recovered.vx_ms, speeds.vx_ms, epsilon = 1e-9);
        assert_relative_eq!(recovered.vy_ms, speeds.vy_ms, epsilon = 1e-9);
        assert_relative_eq!(recovered.omega_rads, speeds.omega_rads, epsilon = 1e-9);
    }

    #[test]
    fn test_too_few_modules() {
        assert!(OmniKinematics::new(vec![[0.3, 0.3]]).is_err());
    }

    #[test]
    fn test_module_count_mismatch() {
        let kin = square_modules();

        assert!(kin
            .inverse(&ActuatorSpeeds::Modules(vec![Default::default(); 3]))
            .is_err());
    }
}
