use super::{check_joint_count, finite_joints, ForwardFlags, InverseFlags, Kinematics, KinematicsError, KinematicsType};
use crate::pose::{JointVector, Pose, NUM_AXES};

/// CoreXY kinematics
///
/// The two XY motors share a belt loop; every other joint maps straight
/// through to its axis.
#[derive(Debug, Clone, Default)]
pub struct CoreXYKinematics;

impl CoreXYKinematics {
    pub fn new() -> Self {
        Self
    }
}

impl Kinematics for CoreXYKinematics {
    fn forward(
        &self,
        joints: &[f64],
        _fflags: ForwardFlags,
        _iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError> {
        check_joint_count(joints, NUM_AXES)?;
        // X = (A + B) / 2
        // Y = (A - B) / 2
        let mut pose = Pose::from_array(std::array::from_fn(|i| joints[i]));
        pose.x = (joints[0] + joints[1]) / 2.0;
        pose.y = (joints[0] - joints[1]) / 2.0;
        Ok(pose)
    }

    fn inverse(
        &self,
        pose: &Pose,
        _iflags: InverseFlags,
        _fflags: &mut ForwardFlags,
    ) -> Result<JointVector, KinematicsError> {
        // Motor A = X + Y
        // Motor B = X - Y
        let mut joints = pose.to_array();
        joints[0] = pose.x + pose.y;
        joints[1] = pose.x - pose.y;
        finite_joints(self.name(), joints.to_vec())
    }

    fn kinematics_type(&self) -> KinematicsType {
        KinematicsType::Both
    }

    fn name(&self) -> &'static str {
        "corexy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belt_coupling() {
        let kins = CoreXYKinematics::new();
        let mut fflags = 0;
        let joints = kins.inverse(&Pose::xyz(10.0, 4.0, 2.0), 0, &mut fflags).unwrap();
        assert_eq!(&joints[..3], &[14.0, 6.0, 2.0]);
        let mut iflags = 0;
        let pose = kins.forward(&joints, 0, &mut iflags).unwrap();
        assert_eq!(pose, Pose::xyz(10.0, 4.0, 2.0));
    }
}
