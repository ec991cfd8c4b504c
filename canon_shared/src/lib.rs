// canon_shared: pose types and kinematics shared by the canon translator and the motion layer

pub mod kinematics;
pub mod pose;

pub use kinematics::{
    create_kinematics, ForwardFlags, InverseFlags, Kinematics, KinematicsConfig,
    KinematicsError, KinematicsKind, KinematicsType,
};
pub use pose::{axis_index, Cartesian, JointVector, Pose, AXIS_NAMES, NUM_AXES};
