use super::{check_joint_count, ForwardFlags, InverseFlags, Kinematics, KinematicsError, KinematicsType};
use crate::pose::{JointVector, Pose, NUM_AXES};

/// One joint per axis, no coupling.
#[derive(Debug, Clone, Default)]
pub struct TrivialKinematics;

impl TrivialKinematics {
    pub fn new() -> Self {
        Self
    }
}

impl Kinematics for TrivialKinematics {
    fn forward(
        &self,
        joints: &[f64],
        _fflags: ForwardFlags,
        _iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError> {
        check_joint_count(joints, NUM_AXES)?;
        Ok(Pose::from_array(std::array::from_fn(|i| joints[i])))
    }

    fn inverse(
        &self,
        pose: &Pose,
        _iflags: InverseFlags,
        _fflags: &mut ForwardFlags,
    ) -> Result<JointVector, KinematicsError> {
        Ok(pose.to_array().to_vec())
    }

    fn kinematics_type(&self) -> KinematicsType {
        KinematicsType::Identity
    }

    fn name(&self) -> &'static str {
        "trivial"
    }
}
