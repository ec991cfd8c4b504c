use super::{check_joint_count, finite_joints, ForwardFlags, InverseFlags, Kinematics, KinematicsError, KinematicsType};
use crate::pose::{Cartesian, JointVector, Pose, NUM_AXES};

/// Five-axis head: the spindle swings on a pivot (B tilts, C swivels) and
/// W extends the tool along the spindle. The tool tip therefore sits on a
/// sphere of radius `pivot_length + w` around the pivot point.
#[derive(Debug, Clone)]
pub struct PivotHeadKinematics {
    pivot_length: f64,
}

impl PivotHeadKinematics {
    pub fn new(pivot_length: f64) -> Self {
        Self { pivot_length }
    }

    /// Tool tip offset from the pivot for tilt `b` and swivel `c` (degrees).
    fn tip_offset(&self, w: f64, b: f64, c: f64) -> Cartesian {
        spherical_to_cartesian(self.pivot_length + w, c, 180.0 - b)
    }
}

/// Radius, azimuth `theta` and polar angle `phi` (both degrees) to XYZ.
fn spherical_to_cartesian(r: f64, theta: f64, phi: f64) -> Cartesian {
    let (t, p) = (theta.to_radians(), phi.to_radians());
    Cartesian::new(r * p.sin() * t.cos(), r * p.sin() * t.sin(), r * p.cos())
}

impl Kinematics for PivotHeadKinematics {
    fn forward(
        &self,
        joints: &[f64],
        _fflags: ForwardFlags,
        _iflags: &mut InverseFlags,
    ) -> Result<Pose, KinematicsError> {
        check_joint_count(joints, NUM_AXES)?;
        let r = self.tip_offset(joints[8], joints[4], joints[5]);
        let mut pose = Pose::from_array(std::array::from_fn(|i| joints[i]));
        pose.x = joints[0] + r.x;
        pose.y = joints[1] + r.y;
        pose.z = joints[2] + self.pivot_length + r.z;
        Ok(pose)
    }

    fn inverse(
        &self,
        pose: &Pose,
        _iflags: InverseFlags,
        _fflags: &mut ForwardFlags,
    ) -> Result<JointVector, KinematicsError> {
        let r = self.tip_offset(pose.w, pose.b, pose.c);
        let mut joints = pose.to_array();
        joints[0] = pose.x - r.x;
        joints[1] = pose.y - r.y;
        joints[2] = pose.z - self.pivot_length - r.z;
        finite_joints(self.name(), joints.to_vec())
    }

    fn kinematics_type(&self) -> KinematicsType {
        KinematicsType::Both
    }

    fn name(&self) -> &'static str {
        "pivot_head"
    }
}
