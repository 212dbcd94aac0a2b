//! # Localisation types
//!
//! This module defines the pose of the robot in the Local Map (LM) frame.
//! The pose source itself (odometry or simulation) is a collaborator of the
//! drive system and only its data type lives here.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and heading in the LM frame) of the robot.
///
/// Heading is the angle to the positive LM_X axis, kept in the canonical
/// range [0, 2*pi). Heading values must never be compared directly, all
/// heading arithmetic goes through the shortest-arc helpers in
/// `util::maths`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in the LM frame
    pub position_m_lm: Vector2<f64>,

    /// The heading in the LM frame, wrapped into [0, 2*pi)
    heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, wrapping the heading into the canonical range.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m_lm: Vector2::new(x_m, y_m),
            heading_rad: wrap_2pi(heading_rad),
        }
    }

    /// Return the heading (angle to the positive LM_X axis) of the robot in
    /// radians.
    ///
    /// Heading is given in the range [0, 2*pi), with 0 being in the LM_X
    /// direction.
    pub fn get_heading(&self) -> f64 {
        self.heading_rad
    }

    /// Get the unit vector pointing in the heading direction (in 2D).
    pub fn forward2(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position_m_lm - self.position_m_lm).norm()
    }

    /// Compose this pose with another, treating both as rigid 2D transforms.
    ///
    /// The result is the transform which first applies `other` and then
    /// `self`, i.e. `other` is expressed in this pose's local frame.
    pub fn compose(&self, other: &Pose) -> Pose {
        let (sin_h, cos_h) = self.heading_rad.sin_cos();

        Pose::new(
            self.position_m_lm[0]
                + cos_h * other.position_m_lm[0]
                - sin_h * other.position_m_lm[1],
            self.position_m_lm[1]
                + sin_h * other.position_m_lm[0]
                + cos_h * other.position_m_lm[1],
            self.heading_rad + other.heading_rad,
        )
    }

    /// Invert this pose as a rigid 2D transform.
    ///
    /// `pose.compose(&pose.inverse())` is the identity transform.
    pub fn inverse(&self) -> Pose {
        let (sin_h, cos_h) = self.heading_rad.sin_cos();

        Pose::new(
            -(cos_h * self.position_m_lm[0] + sin_h * self.position_m_lm[1]),
            -(-sin_h * self.position_m_lm[0] + cos_h * self.position_m_lm[1]),
            -self.heading_rad,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_heading_wrapped() {
        assert_relative_eq!(Pose::new(0.0, 0.0, -FRAC_PI_2).get_heading(), 1.5 * PI);
        assert_relative_eq!(Pose::new(0.0, 0.0, TAU + 1.0).get_heading(), 1.0);
    }

    #[test]
    fn test_compose_inverse_is_identity() {
        let pose = Pose::new(1.2, -3.4, 0.7);
        let ident = pose.compose(&pose.inverse());

        assert_relative_eq!(ident.position_m_lm[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ident.position_m_lm[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ident.get_heading(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_rotates_translation() {
        // A transform of +1m in local X applied to a pose facing +Y moves
        // the pose +1m in global Y
        let pose = Pose::new(0.0, 0.0, FRAC_PI_2);
        let moved = pose.compose(&Pose::new(1.0, 0.0, 0.0));

        assert_relative_eq!(moved.position_m_lm[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(moved.position_m_lm[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.get_heading(), FRAC_PI_2);
    }
}
