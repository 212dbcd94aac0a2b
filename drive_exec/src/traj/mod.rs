//! # Trajectory module
//!
//! This module defines the time-indexed path followed by the autonomous
//! drive system. A trajectory is an immutable, strictly time-monotonic
//! sequence of states carrying pose, velocity, acceleration and curvature.
//! Sampling between states interpolates linearly, with headings
//! interpolated along the shortest arc.
//!
//! Trajectories come from the generator (see [`gen`]) or from a serialized
//! sample list recorded by a path planning tool. A trajectory which fails
//! validation is never returned partially populated.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod gen;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::loc::Pose;
use util::maths::get_ang_dist_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single time-indexed sample of a trajectory.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct TrajectoryState {
    /// Time since the start of the trajectory.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Pose of the robot at this state
    pub pose: Pose,

    /// Linear velocity along the path. Negative when driving in reverse.
    ///
    /// Units: meters/second
    pub velocity_ms: f64,

    /// Linear acceleration along the path.
    ///
    /// Units: meters/second^2
    pub accel_ms2: f64,

    /// Curvature of the path, such that the nominal angular rate is
    /// `velocity_ms * curvature_m`.
    ///
    /// Units: 1/meters
    pub curvature_m: f64,
}

/// An immutable, time-ordered sequence of trajectory states.
///
/// Invariants (enforced at construction): at least one state, all samples
/// finite, timestamps non-negative and strictly increasing. The sequence is
/// never edited in place; re-parameterisation produces a new instance.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    states: Vec<TrajectoryState>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors in trajectory construction or loading.
#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    #[error("A trajectory must contain at least one state")]
    Empty,

    #[error("Trajectory timestamps must be non-negative (state {0})")]
    NegativeTime(usize),

    #[error("Trajectory timestamps must strictly increase (state {0})")]
    NonMonotonicTime(usize),

    #[error("Trajectory contains a non-finite sample (state {0})")]
    NonFiniteSample(usize),

    #[error("Cannot load the trajectory file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot parse the trajectory file: {0}")]
    DeserialiseError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    /// Build a trajectory from a sequence of states, validating the
    /// trajectory invariants.
    pub fn new(mut states: Vec<TrajectoryState>) -> Result<Self, TrajError> {
        if states.is_empty() {
            return Err(TrajError::Empty);
        }

        // Deserialized poses may carry unwrapped headings, re-canonicalise
        for state in states.iter_mut() {
            state.pose = Pose::new(
                state.pose.position_m_lm[0],
                state.pose.position_m_lm[1],
                state.pose.get_heading(),
            );
        }

        for (i, state) in states.iter().enumerate() {
            let finite = state.time_s.is_finite()
                && state.pose.position_m_lm[0].is_finite()
                && state.pose.position_m_lm[1].is_finite()
                && state.pose.get_heading().is_finite()
                && state.velocity_ms.is_finite()
                && state.accel_ms2.is_finite()
                && state.curvature_m.is_finite();

            if !finite {
                return Err(TrajError::NonFiniteSample(i));
            }

            if state.time_s < 0.0 {
                return Err(TrajError::NegativeTime(i));
            }

            if i > 0 && state.time_s <= states[i - 1].time_s {
                return Err(TrajError::NonMonotonicTime(i));
            }
        }

        Ok(Self { states })
    }

    /// Load a trajectory from a serialized JSON sample list.
    ///
    /// Failures surface as an explicit error, never as a partially
    /// populated trajectory.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, TrajError> {
        let json = std::fs::read_to_string(path).map_err(TrajError::FileLoadError)?;
        Self::from_json(&json)
    }

    /// Parse a trajectory from a JSON sample list string.
    pub fn from_json(json: &str) -> Result<Self, TrajError> {
        let states: Vec<TrajectoryState> =
            serde_json::from_str(json).map_err(TrajError::DeserialiseError)?;
        Self::new(states)
    }

    /// The states making up the trajectory.
    pub fn states(&self) -> &[TrajectoryState] {
        &self.states
    }

    /// The first state of the trajectory.
    pub fn first(&self) -> &TrajectoryState {
        // Non-empty by construction
        &self.states[0]
    }

    /// The last state of the trajectory.
    pub fn last(&self) -> &TrajectoryState {
        &self.states[self.states.len() - 1]
    }

    /// Total duration of the trajectory.
    ///
    /// Units: seconds
    pub fn duration_s(&self) -> f64 {
        self.last().time_s
    }

    /// Get the number of states in the trajectory
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Sample the state that applies at the given elapsed time.
    ///
    /// Times at or before the first state return the first state, times at
    /// or beyond the duration return the last state - the path is never
    /// extrapolated. Interior times interpolate the bracketing pair of
    /// states: x, y, velocity, acceleration and curvature linearly, heading
    /// along the shortest arc.
    ///
    /// Sampling is side-effect free and idempotent, it is safe to re-query
    /// the same time (e.g. for visualisation) without disturbing anything.
    pub fn sample(&self, time_s: f64) -> TrajectoryState {
        if time_s <= self.first().time_s {
            return *self.first();
        }
        if time_s >= self.duration_s() {
            return *self.last();
        }

        // Index of the first state after time_s. The clamps above
        // guarantee a bracketing pair exists.
        let next = self.states.partition_point(|s| s.time_s <= time_s);
        let s0 = &self.states[next - 1];
        let s1 = &self.states[next];

        let frac = (time_s - s0.time_s) / (s1.time_s - s0.time_s);

        TrajectoryState {
            time_s,
            pose: Pose::new(
                lerp(s0.pose.position_m_lm[0], s1.pose.position_m_lm[0], frac),
                lerp(s0.pose.position_m_lm[1], s1.pose.position_m_lm[1], frac),
                s0.pose.get_heading()
                    + frac * get_ang_dist_2pi(s0.pose.get_heading(), s1.pose.get_heading()),
            ),
            velocity_ms: lerp(s0.velocity_ms, s1.velocity_ms, frac),
            accel_ms2: lerp(s0.accel_ms2, s1.accel_ms2, frac),
            curvature_m: lerp(s0.curvature_m, s1.curvature_m, frac),
        }
    }

    /// Produce a new trajectory with every pose shifted by a rigid
    /// transform, leaving this one untouched.
    ///
    /// `delta` is applied to the initial pose in its local frame, and every
    /// other pose keeps its rigid relation to the first. Velocity,
    /// acceleration and curvature are unaffected by a rigid transform.
    pub fn transform_by(&self, delta: &Pose) -> Trajectory {
        let first = self.first().pose;
        let new_first = first.compose(delta);

        // Global shift mapping the old first pose onto the new one
        let shift = new_first.compose(&first.inverse());

        Trajectory {
            states: self
                .states
                .iter()
                .map(|s| TrajectoryState {
                    pose: shift.compose(&s.pose),
                    ..*s
                })
                .collect(),
        }
    }

    /// Re-anchor the path shape so that it starts at the given pose.
    ///
    /// Used to replay a recorded or pre-generated shape from the robot's
    /// current pose.
    pub fn anchored_at(&self, pose: &Pose) -> Trajectory {
        let delta = self.first().pose.inverse().compose(pose);
        self.transform_by(&delta)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn lerp(a: f64, b: f64, frac: f64) -> f64 {
    a + (b - a) * frac
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

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

    #[test]
    fn test_sample_interior() {
        let traj = straight_traj();

        let state = traj.sample(1.0);

        assert_relative_eq!(state.pose.position_m_lm[0], 2.0);
        assert_relative_eq!(state.pose.position_m_lm[1], 0.0);
        assert_relative_eq!(state.pose.get_heading(), 0.0);
        assert_relative_eq!(state.velocity_ms, 2.0);
    }

    #[test]
    fn test_sample_clamped() {
        let traj = straight_traj();

        // Before the start
        let state = traj.sample(-1.0);
        assert_relative_eq!(state.pose.position_m_lm[0], 0.0);

        // Past the end
        let state = traj.sample(3.0);
        assert_relative_eq!(state.pose.position_m_lm[0], 4.0);
        assert_relative_eq!(state.velocity_ms, 2.0);
    }

    #[test]
    fn test_sample_continuous() {
        let traj = straight_traj();

        // Approaching an interior time from both sides converges on the
        // same state
        let before = traj.sample(1.0 - 1e-9);
        let after = traj.sample(1.0 + 1e-9);

        assert_relative_eq!(
            before.pose.position_m_lm[0],
            after.pose.position_m_lm[0],
            epsilon = 1e-6
        );
        assert_relative_eq!(before.velocity_ms, after.velocity_ms, epsilon = 1e-6);
    }

    #[test]
    fn test_sample_heading_shortest_arc() {
        // Heading crosses the 0/2pi wrap between the two states
        let traj = Trajectory::new(vec![
            TrajectoryState {
                time_s: 0.0,
                pose: Pose::new(0.0, 0.0, -0.2),
                velocity_ms: 1.0,
                accel_ms2: 0.0,
                curvature_m: 0.0,
            },
            TrajectoryState {
                time_s: 1.0,
                pose: Pose::new(1.0, 0.0, 0.2),
                velocity_ms: 1.0,
                accel_ms2: 0.0,
                curvature_m: 0.0,
            },
        ])
        .unwrap();

        // Halfway through, the heading is on the wrap point, not at pi
        assert_relative_eq!(traj.sample(0.5).pose.get_heading(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_invalid_sequences() {
        assert!(matches!(Trajectory::new(vec![]), Err(TrajError::Empty)));

        let state = TrajectoryState {
            time_s: 0.0,
            pose: Pose::new(0.0, 0.0, 0.0),
            velocity_ms: 1.0,
            accel_ms2: 0.0,
            curvature_m: 0.0,
        };

        // Repeated timestamp
        assert!(matches!(
            Trajectory::new(vec![state, state]),
            Err(TrajError::NonMonotonicTime(1))
        ));

        // Non-finite velocity
        let mut bad = state;
        bad.velocity_ms = f64::NAN;
        assert!(matches!(
            Trajectory::new(vec![bad]),
            Err(TrajError::NonFiniteSample(0))
        ));

        // Negative time
        let mut early = state;
        early.time_s = -0.5;
        assert!(matches!(
            Trajectory::new(vec![early]),
            Err(TrajError::NegativeTime(0))
        ));
    }

    #[test]
    fn test_anchored_at_moves_start() {
        let traj = straight_traj();

        let anchor = Pose::new(1.0, 1.0, FRAC_PI_2);
        let moved = traj.anchored_at(&anchor);

        // The first pose is now the anchor
        assert_relative_eq!(moved.first().pose.position_m_lm[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.first().pose.position_m_lm[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.first().pose.get_heading(), FRAC_PI_2, epsilon = 1e-12);

        // The 4m straight now runs along +Y from the anchor
        assert_relative_eq!(moved.last().pose.position_m_lm[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.last().pose.position_m_lm[1], 5.0, epsilon = 1e-12);

        // Velocity and duration are unaffected
        assert_relative_eq!(moved.last().velocity_ms, 2.0);
        assert_relative_eq!(moved.duration_s(), 2.0);

        // The original is untouched
        assert_relative_eq!(traj.first().pose.position_m_lm[0], 0.0);
    }

    #[test]
    fn test_from_json_round_trip() {
        let traj = straight_traj();

        let json = serde_json::to_string(traj.states()).unwrap();
        let loaded = Trajectory::from_json(&json).unwrap();

        assert_eq!(loaded.num_states(), 2);
        assert_relative_eq!(loaded.duration_s(), 2.0);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Trajectory::from_json("not json").is_err());
        assert!(Trajectory::from_json("[]").is_err());
    }
}
