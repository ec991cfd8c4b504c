// canon_shared::kinematics - pose <-> joint transforms for each machine geometry
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::pose::{JointVector, Pose, NUM_AXES};

mod corexy;
mod pivot_head;
mod rotary_table;
mod trivial;

pub use corexy::CoreXYKinematics;
pub use pivot_head::PivotHeadKinematics;
pub use rotary_table::RotaryTableKinematics;
pub use trivial::TrivialKinematics;

/// Geometry-specific hints passed alongside a forward solve.
pub type ForwardFlags = u64;
/// Geometry-specific hints passed alongside an inverse solve.
pub type InverseFlags = u64;

/// Which directions a geometry can solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KinematicsType {
    Identity,
    ForwardOnly,
    InverseOnly,
    Both,
}

#[derive(Debug, Error, PartialEq)]
pub enum KinematicsError {
    #[error("expected {expected} joints, got {actual}")]
    JointCount { expected: usize, actual: usize },
    #[error("pose is unreachable: {0}")]
    Unreachable(String),
    #[error("unknown kinematics '{0}'")]
    UnknownKind(String),
}

/// Kinematics handler for one machine geometry.
///
/// Implementations hold only their fixed geometry parameters, so a single
/// instance can be shared between threads and called without locking.
pub trait Kinematics: Send + Sync {
    /// Joint positions to tool pose.
    fn forward(
        &self,
        joints: &[f64],
        fflags: ForwardFlags,
        iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError>;

    /// Tool pose to joint positions.
    fn inverse(
        &self,
        pose: &Pose,
        iflags: InverseFlags,
        fflags: &mut ForwardFlags,
    ) -> Result<JointVector, KinematicsError>;

    /// Homing trusts the joint readouts: the pose is whatever forward
    /// kinematics says it is, with both flag words cleared.
    fn home(
        &self,
        joints: &[f64],
        fflags: &mut ForwardFlags,
        iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError> {
        *fflags = 0;
        *iflags = 0;
        self.forward(joints, *fflags, iflags)
    }

    fn kinematics_type(&self) -> KinematicsType;

    fn joint_count(&self) -> usize {
        NUM_AXES
    }

    fn name(&self) -> &'static str;
}

pub(crate) fn check_joint_count(joints: &[f64], expected: usize) -> Result<(), KinematicsError> {
    if joints.len() != expected {
        return Err(KinematicsError::JointCount {
            expected,
            actual: joints.len(),
        });
    }
    Ok(())
}

/// Joint values a geometry cannot drive to (NaN or infinite) mean the pose
/// lies outside anything the machine can reach.
pub(crate) fn finite_joints(geometry: &str, joints: JointVector) -> Result<JointVector, KinematicsError> {
    match joints.iter().position(|j| !j.is_finite()) {
        Some(index) => Err(KinematicsError::Unreachable(format!(
            "{} joint {} has no finite solution",
            geometry, index
        ))),
        None => Ok(joints),
    }
}

/// Geometry names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KinematicsKind {
    Trivial,
    #[serde(rename = "corexy")]
    CoreXY,
    RotaryTable,
    PivotHead,
}

impl FromStr for KinematicsKind {
    type Err = KinematicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trivial" | "identity" => Ok(Self::Trivial),
            "corexy" => Ok(Self::CoreXY),
            "rotary_table" => Ok(Self::RotaryTable),
            "pivot_head" => Ok(Self::PivotHead),
            other => Err(KinematicsError::UnknownKind(other.to_string())),
        }
    }
}

/// Geometry selection plus the constants each geometry reads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KinematicsConfig {
    #[serde(default = "default_kind")]
    pub kind: KinematicsKind,
    #[serde(default = "default_pivot_length")]
    pub pivot_length: f64,
    #[serde(default)]
    pub y_shift: f64,
    #[serde(default)]
    pub z_shift: f64,
    #[serde(default = "default_correction_enabled")]
    pub correction_enabled: bool,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            pivot_length: default_pivot_length(),
            y_shift: 0.0,
            z_shift: 0.0,
            correction_enabled: default_correction_enabled(),
        }
    }
}

fn default_kind() -> KinematicsKind { KinematicsKind::Trivial }
fn default_pivot_length() -> f64 { 250.0 }
fn default_correction_enabled() -> bool { true }

/// Factory for creating kinematics handlers
pub fn create_kinematics(config: &KinematicsConfig) -> Box<dyn Kinematics + Send + Sync> {
    tracing::debug!("Creating {:?} kinematics", config.kind);
    match config.kind {
        KinematicsKind::Trivial => Box::new(TrivialKinematics::new()),
        KinematicsKind::CoreXY => Box::new(CoreXYKinematics::new()),
        KinematicsKind::RotaryTable => Box::new(RotaryTableKinematics::new(
            config.y_shift,
            config.z_shift,
            config.correction_enabled,
        )),
        KinematicsKind::PivotHead => Box::new(PivotHeadKinematics::new(config.pivot_length)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("corexy".parse::<KinematicsKind>(), Ok(KinematicsKind::CoreXY));
        assert_eq!("Pivot_Head".parse::<KinematicsKind>(), Ok(KinematicsKind::PivotHead));
        assert_eq!(
            "delta".parse::<KinematicsKind>(),
            Err(KinematicsError::UnknownKind("delta".to_string()))
        );
    }

    #[test]
    fn test_factory_selects_geometry() {
        let mut config = KinematicsConfig::default();
        assert_eq!(create_kinematics(&config).name(), "trivial");
        config.kind = KinematicsKind::PivotHead;
        let kins = create_kinematics(&config);
        assert_eq!(kins.name(), "pivot_head");
        assert_eq!(kins.kinematics_type(), KinematicsType::Both);
    }

    #[test]
    fn test_geometry_is_shared_between_threads() {
        let config = KinematicsConfig {
            kind: KinematicsKind::RotaryTable,
            y_shift: 5.0,
            ..KinematicsConfig::default()
        };
        let kins = create_kinematics(&config);
        let pose = Pose { a: 30.0, ..Pose::xyz(1.0, 2.0, 3.0) };
        let mut fflags = 0;
        let expected = kins.inverse(&pose, 0, &mut fflags).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut fflags = 0;
                    assert_eq!(kins.inverse(&pose, 0, &mut fflags).unwrap(), expected);
                });
            }
        });
    }

    #[test]
    fn test_non_finite_joints_are_unreachable() {
        assert!(finite_joints("test", vec![1.0, 2.0]).is_ok());
        assert!(matches!(
            finite_joints("test", vec![1.0, f64::NAN]),
            Err(KinematicsError::Unreachable(msg)) if msg.contains("joint 1")
        ));
    }

    #[test]
    fn test_home_clears_flags_and_uses_forward() {
        let config = KinematicsConfig {
            kind: KinematicsKind::RotaryTable,
            z_shift: 10.0,
            ..KinematicsConfig::default()
        };
        let kins = create_kinematics(&config);
        let joints = [1.0, 2.0, 3.0, 45.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let (mut fflags, mut iflags) = (7, 9);
        let homed = kins.home(&joints, &mut fflags, &mut iflags).unwrap();
        assert_eq!((fflags, iflags), (0, 0));
        let mut scratch = 0;
        let forward = kins.forward(&joints, 0, &mut scratch).unwrap();
        assert_eq!(homed, forward);
    }

    #[test]
    fn test_wrong_joint_count_is_rejected() {
        let kins = create_kinematics(&KinematicsConfig::default());
        let mut iflags = 0;
        let result = kins.forward(&[0.0; 3], 0, &mut iflags);
        assert_eq!(result, Err(KinematicsError::JointCount { expected: 9, actual: 3 }));
    }
}
