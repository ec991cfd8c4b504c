// canon_shared::pose - nine-axis pose and small vector helpers
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Number of axes carried by every pose: X Y Z, A B C, U V W.
pub const NUM_AXES: usize = 9;

pub const AXIS_NAMES: [&str; NUM_AXES] = ["x", "y", "z", "a", "b", "c", "u", "v", "w"];

/// Map an axis letter (either case) to its index in a pose.
pub fn axis_index(name: &str) -> Option<usize> {
    let lower = name.to_ascii_lowercase();
    AXIS_NAMES.iter().position(|axis| *axis == lower)
}

/// Physical joint values, one per machine degree of freedom.
pub type JointVector = Vec<f64>;

/// A nine-axis position. Linear axes in length units, rotary axes in degrees.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl Pose {
    pub const ZERO: Pose = Pose {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        a: 0.0,
        b: 0.0,
        c: 0.0,
        u: 0.0,
        v: 0.0,
        w: 0.0,
    };

    #[allow(clippy::too_many_arguments)]
    pub fn new(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64, u: f64, v: f64, w: f64) -> Self {
        Self { x, y, z, a, b, c, u, v, w }
    }

    /// Pose with only the XYZ triple set.
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, ..Self::ZERO }
    }

    pub fn from_array(values: [f64; NUM_AXES]) -> Self {
        let [x, y, z, a, b, c, u, v, w] = values;
        Self { x, y, z, a, b, c, u, v, w }
    }

    pub fn to_array(&self) -> [f64; NUM_AXES] {
        [self.x, self.y, self.z, self.a, self.b, self.c, self.u, self.v, self.w]
    }

    pub fn axis(&self, index: usize) -> f64 {
        self.to_array()[index]
    }

    pub fn set_axis(&mut self, index: usize, value: f64) {
        let mut values = self.to_array();
        values[index] = value;
        *self = Self::from_array(values);
    }

    /// Apply `linear` to X Y Z U V W and `angular` to A B C.
    pub fn map_axes(&self, linear: impl Fn(f64) -> f64, angular: impl Fn(f64) -> f64) -> Self {
        Self {
            x: linear(self.x),
            y: linear(self.y),
            z: linear(self.z),
            a: angular(self.a),
            b: angular(self.b),
            c: angular(self.c),
            u: linear(self.u),
            v: linear(self.v),
            w: linear(self.w),
        }
    }

    pub fn tran(&self) -> Cartesian {
        Cartesian::new(self.x, self.y, self.z)
    }

    pub fn same_abc(&self, other: &Pose) -> bool {
        self.a == other.a && self.b == other.b && self.c == other.c
    }

    pub fn same_uvw(&self, other: &Pose) -> bool {
        self.u == other.u && self.v == other.v && self.w == other.w
    }

    pub fn same_xyz(&self, other: &Pose) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }

    /// Componentwise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &Pose, tolerance: f64) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Add for Pose {
    type Output = Pose;

    fn add(self, rhs: Pose) -> Pose {
        let (l, r) = (self.to_array(), rhs.to_array());
        Pose::from_array(std::array::from_fn(|i| l[i] + r[i]))
    }
}

impl Sub for Pose {
    type Output = Pose;

    fn sub(self, rhs: Pose) -> Pose {
        let (l, r) = (self.to_array(), rhs.to_array());
        Pose::from_array(std::array::from_fn(|i| l[i] - r[i]))
    }
}

/// A plain 3-vector, used for arc centers, normals and point-to-line tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Cartesian) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn mag(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Add for Cartesian {
    type Output = Cartesian;

    fn add(self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Cartesian {
    type Output = Cartesian;

    fn sub(self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<Cartesian> for f64 {
    type Output = Cartesian;

    fn mul(self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}
