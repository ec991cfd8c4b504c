use super::{check_joint_count, finite_joints, ForwardFlags, InverseFlags, Kinematics, KinematicsError, KinematicsType};
use crate::pose::{JointVector, Pose, NUM_AXES};

/// Mill with a rotary table turning about an axis parallel to X (the A
/// axis), whose center sits at (`y_shift`, `z_shift`) from machine zero.
///
/// The Y/Z joints are corrected by rotating their polar angle about the
/// table center: forward subtracts A, inverse adds it back. With the
/// correction disabled the geometry degrades to a plain pass-through.
#[derive(Debug, Clone)]
pub struct RotaryTableKinematics {
    y_shift: f64,
    z_shift: f64,
    enabled: bool,
}

impl RotaryTableKinematics {
    pub fn new(y_shift: f64, z_shift: f64, enabled: bool) -> Self {
        Self { y_shift, z_shift, enabled }
    }

    /// Rotate (y, z) about the table center by `degrees`.
    fn rotate_yz(&self, y: f64, z: f64, degrees: f64) -> (f64, f64) {
        let dy = y - self.y_shift;
        let dz = z - self.z_shift;
        let radius = dy.hypot(dz);
        let theta = dz.atan2(dy) + degrees.to_radians();
        (
            self.y_shift + radius * theta.cos(),
            self.z_shift + radius * theta.sin(),
        )
    }
}

impl Kinematics for RotaryTableKinematics {
    fn forward(
        &self,
        joints: &[f64],
        _fflags: ForwardFlags,
        _iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError> {
        check_joint_count(joints, NUM_AXES)?;
        let mut pose = Pose::from_array(std::array::from_fn(|i| joints[i]));
        if self.enabled {
            (pose.y, pose.z) = self.rotate_yz(joints[1], joints[2], -joints[3]);
        }
        Ok(pose)
    }

    fn inverse(
        &self,
        pose: &Pose,
        _iflags: InverseFlags,
        _fflags: &mut ForwardFlags,
    ) -> Result<JointVector, KinematicsError> {
        let mut joints = pose.to_array();
        if self.enabled {
            (joints[1], joints[2]) = self.rotate_yz(pose.y, pose.z, pose.a);
        }
        finite_joints(self.name(), joints.to_vec())
    }

    fn kinematics_type(&self) -> KinematicsType {
        KinematicsType::Both
    }

    fn name(&self) -> &'static str {
        "rotary_table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_turn_about_shifted_center() {
        let kins = RotaryTableKinematics::new(0.0, 10.0, true);
        // Point 5mm along +Y from the center, table at A=90.
        let pose = Pose { y: 5.0, z: 10.0, a: 90.0, ..Pose::ZERO };
        let mut fflags = 0;
        let joints = kins.inverse(&pose, 0, &mut fflags).unwrap();
        assert!(joints[1].abs() < 1e-9);
        assert!((joints[2] - 15.0).abs() < 1e-9);
        assert_eq!(joints[3], 90.0);
    }

    #[test]
    fn test_disabled_correction_passes_through() {
        let kins = RotaryTableKinematics::new(3.0, 4.0, false);
        let pose = Pose { y: 5.0, z: 1.0, a: 30.0, ..Pose::ZERO };
        let mut fflags = 0;
        let joints = kins.inverse(&pose, 0, &mut fflags).unwrap();
        assert_eq!(joints, pose.to_array().to_vec());
    }

    #[test]
    fn test_round_trip() {
        let kins = RotaryTableKinematics::new(-2.0, 7.5, true);
        let pose = Pose::new(12.0, -3.0, 40.0, 33.0, 0.0, 10.0, 1.0, 2.0, 3.0);
        let mut flags = 0;
        let joints = kins.inverse(&pose, 0, &mut flags).unwrap();
        let back = kins.forward(&joints, 0, &mut flags).unwrap();
        assert!(back.approx_eq(&pose, 1e-9));
    }

    #[test]
    fn test_infinite_pose_is_unreachable() {
        let kins = RotaryTableKinematics::new(0.0, 10.0, true);
        let pose = Pose { y: f64::INFINITY, a: 15.0, ..Pose::ZERO };
        let mut fflags = 0;
        assert!(matches!(kins.inverse(&pose, 0, &mut fflags), Err(KinematicsError::Unreachable(_))));
    }
}
