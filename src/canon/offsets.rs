// src/canon/offsets.rs - work/tool offset stack and XY rotation
use canon_shared::{Cartesian, Pose};

/// Rotate (x, y) counter-clockwise by `degrees`.
pub fn rotate(x: f64, y: f64, degrees: f64) -> (f64, f64) {
    if degrees == 0.0 {
        return (x, y);
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// Rotate a direction vector about Z.
pub fn rotate_vector(v: Cartesian, degrees: f64) -> Cartesian {
    let (x, y) = rotate(v.x, v.y, degrees);
    Cartesian::new(x, y, v.z)
}

/// Offsets that turn a program position into a machine position.
///
/// Applied in a fixed order: the G92-style offset first, then the XY
/// rotation (degrees, about the work origin), then the work coordinate
/// offset, then the tool length offset. Removal runs the exact reverse.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OffsetStack {
    pub g5x: Pose,
    pub g92: Pose,
    pub tool: Pose,
    pub xy_rotation: f64,
}

impl OffsetStack {
    pub fn apply_offsets(&self, pose: &Pose) -> Pose {
        let mut p = *pose + self.g92;
        (p.x, p.y) = rotate(p.x, p.y, self.xy_rotation);
        p + self.g5x + self.tool
    }

    pub fn remove_offsets(&self, pose: &Pose) -> Pose {
        let mut p = *pose - self.tool - self.g5x;
        (p.x, p.y) = rotate(p.x, p.y, -self.xy_rotation);
        p - self.g92
    }

    /// Sum of the three X offsets, used as the lathe radius reference.
    pub fn total_x(&self) -> f64 {
        self.g5x.x + self.g92.x + self.tool.x
    }
}
