// src/canon/nurbs.rs - planar NURBS evaluation and biarc fitting
use serde::{Deserialize, Serialize};

/// Below this the arc through two points is treated as a straight line.
const MIN_ARC_DENOMINATOR: f64 = 1e-6;

/// Weighted XY control point, in program units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 { 1.0 }

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn dot(self, other: Point2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    fn scale(self, k: f64) -> Point2 {
        Point2::new(self.x * k, self.y * k)
    }

    fn add(self, other: Point2) -> Point2 {
        Point2::new(self.x + other.x, self.y + other.y)
    }

    fn sub(self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    fn unit(self) -> Point2 {
        let len = self.dot(self).sqrt();
        if len == 0.0 { self } else { self.scale(1.0 / len) }
    }
}

/// Clamped, uniform knot vector for `n + 1` control points of order `k`
/// (degree `k - 1`). Runs from 0 to `n - k + 2`.
pub fn knot_vector(n: usize, k: usize) -> Vec<f64> {
    (0..=n + k)
        .map(|i| {
            if i < k {
                0.0
            } else if i <= n {
                (i + 1 - k) as f64
            } else {
                (n + 2 - k) as f64
            }
        })
        .collect()
}

fn basis(i: usize, k: usize, u: f64, knots: &[f64]) -> f64 {
    if k == 1 {
        return if knots[i] <= u && u < knots[i + 1] { 1.0 } else { 0.0 };
    }
    let mut value = 0.0;
    let left = knots[i + k - 1] - knots[i];
    if left != 0.0 {
        value += (u - knots[i]) / left * basis(i, k - 1, u, knots);
    }
    let right = knots[i + k] - knots[i + 1];
    if right != 0.0 {
        value += (knots[i + k] - u) / right * basis(i + 1, k - 1, u, knots);
    }
    value
}

fn basis_derivative(i: usize, k: usize, u: f64, knots: &[f64]) -> f64 {
    if k == 1 {
        return 0.0;
    }
    let order = (k - 1) as f64;
    let mut value = 0.0;
    let left = knots[i + k - 1] - knots[i];
    if left != 0.0 {
        value += order / left * basis(i, k - 1, u, knots);
    }
    let right = knots[i + k] - knots[i + 1];
    if right != 0.0 {
        value -= order / right * basis(i + 1, k - 1, u, knots);
    }
    value
}

/// A planar rational B-spline.
#[derive(Debug, Clone)]
pub struct NurbsCurve {
    control_points: Vec<ControlPoint>,
    order: usize,
    knots: Vec<f64>,
}

impl NurbsCurve {
    /// Returns `None` when there are fewer control points than the order
    /// or the order is below 2.
    pub fn new(control_points: Vec<ControlPoint>, order: usize) -> Option<Self> {
        if order < 2 || control_points.len() < order {
            return None;
        }
        let knots = knot_vector(control_points.len() - 1, order);
        Some(Self { control_points, order, knots })
    }

    pub fn u_max(&self) -> f64 {
        let n = self.control_points.len() - 1;
        (n + 2 - self.order) as f64
    }

    /// Number of sample intervals the curve is cut into.
    pub fn division_count(&self) -> usize {
        self.control_points.len() * 4
    }

    /// Weighted control point sum and weight sum for basis values `f(i)`.
    fn weighted_sums(&self, f: impl Fn(usize) -> f64) -> (Point2, f64) {
        self.control_points
            .iter()
            .enumerate()
            .fold((Point2::default(), 0.0), |(acc, w), (i, cp)| {
                let n = f(i) * cp.weight;
                (acc.add(Point2::new(cp.x, cp.y).scale(n)), w + n)
            })
    }

    pub fn point(&self, u: f64) -> Point2 {
        if u >= self.u_max() {
            let last = self.control_points[self.control_points.len() - 1];
            return Point2::new(last.x, last.y);
        }
        let (a, w) = self.weighted_sums(|i| basis(i, self.order, u, &self.knots));
        a.scale(1.0 / w)
    }

    /// Derivative direction at `u`; not normalized.
    pub fn tangent(&self, u: f64) -> Point2 {
        let count = self.control_points.len();
        if u >= self.u_max() {
            let last = self.control_points[count - 1];
            let prev = self.control_points[count - 2];
            return Point2::new(last.x - prev.x, last.y - prev.y);
        }
        let (a, w) = self.weighted_sums(|i| basis(i, self.order, u, &self.knots));
        let (da, dw) = self.weighted_sums(|i| basis_derivative(i, self.order, u, &self.knots));
        let c = a.scale(1.0 / w);
        da.sub(c.scale(dw)).scale(1.0 / w)
    }

    /// Consecutive (point, tangent) samples from the start of the curve to
    /// its end, `division_count() + 1` of them.
    pub fn samples(&self) -> Vec<(Point2, Point2)> {
        let divisions = self.division_count();
        let u_max = self.u_max();
        (0..=divisions)
            .map(|i| {
                let u = u_max * i as f64 / divisions as f64;
                (self.point(u), self.tangent(u))
            })
            .collect()
    }
}

/// One planar piece of a linearized curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanarStep {
    Arc { end: Point2, center: Point2, rotation: i32 },
    Line { end: Point2 },
}

/// Circular arc from `p0` to `p1` leaving `p0` along `direction`. Nearly
/// straight cases come back as a line.
pub fn arc_step(p0: Point2, p1: Point2, direction: Point2) -> PlanarStep {
    let chord = p1.sub(p0);
    let den = 2.0 * (chord.y * direction.x - chord.x * direction.y);
    if den.abs() > MIN_ARC_DENOMINATOR {
        let r = -chord.dot(chord) / den;
        let center = Point2::new(p0.x + direction.y * r, p0.y - direction.x * r);
        PlanarStep::Arc {
            end: p1,
            center,
            rotation: if r < 0.0 { 1 } else { -1 },
        }
    } else {
        PlanarStep::Line { end: p1 }
    }
}

/// Joins `p0` (leaving along `ts`) to `p4` (arriving along `te`) with two
/// tangent-continuous arcs. `r` sets the ratio of the two arc tangent
/// lengths. Returns `None` when no positive solution exists.
pub fn biarc(p0: Point2, ts: Point2, p4: Point2, te: Point2, r: f64) -> Option<[PlanarStep; 2]> {
    let ts = ts.unit();
    let te = te.unit();
    let v = p0.sub(p4);
    let c = v.dot(v);
    let b = 2.0 * v.dot(ts.scale(r).add(te));
    let a = 2.0 * r * (ts.dot(te) - 1.0);

    let beta = if a.abs() < 1e-12 {
        // Parallel tangents: the quadratic collapses to b * beta + c = 0.
        -c / b
    } else {
        let discr = b * b - 4.0 * a * c;
        if discr < 0.0 {
            return None;
        }
        let root = discr.sqrt();
        let beta1 = (-b - root) / (2.0 * a);
        let beta2 = (-b + root) / (2.0 * a);
        if beta1 > 0.0 && beta2 > 0.0 {
            return None;
        }
        beta1.max(beta2)
    };
    if !(beta > 0.0 && beta.is_finite()) {
        return None;
    }
    let alpha = beta * r;

    let p1 = p0.add(ts.scale(alpha));
    let p3 = p4.sub(te.scale(beta));
    let p2 = p1.scale(beta).add(p3.scale(alpha)).scale(1.0 / (alpha + beta));
    let tm = p3.sub(p2).unit();

    Some([arc_step(p0, p2, ts), arc_step(p2, p4, tm)])
}
