// src/canon/coalesce.rs - collinear feed segment chaining
use canon_shared::Pose;

/// A chain stops accepting links once it holds more than this many points.
pub const MAX_CHAINED_SEGMENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainedPoint {
    pub pose: Pose,
    pub line_number: i32,
}

/// Buffered straight feeds that may collapse into a single move.
///
/// Points stay buffered as long as every one of them lies within
/// `tolerance` of the straight line from the last emitted end point to the
/// newest candidate. The owning session decides when to flush.
#[derive(Debug, Clone, Default)]
pub struct SegmentChain {
    points: Vec<ChainedPoint>,
    tolerance: f64,
}

impl SegmentChain {
    pub fn new(tolerance: f64) -> Self {
        Self { points: Vec::new(), tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&ChainedPoint> {
        self.points.last()
    }

    pub fn push(&mut self, point: ChainedPoint) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Empties the chain, returning the point that ends it.
    pub fn take_last(&mut self) -> Option<ChainedPoint> {
        let last = self.points.pop();
        self.points.clear();
        last
    }

    /// Whether `candidate` can extend the chain that started at `end_point`.
    pub fn linkable(&self, candidate: &Pose, end_point: &Pose, blending: bool) -> bool {
        let Some(last) = self.points.last() else {
            return false;
        };
        if !blending || self.tolerance == 0.0 {
            return false;
        }
        if self.points.len() > MAX_CHAINED_SEGMENTS {
            return false;
        }
        if !candidate.same_abc(&last.pose) || !candidate.same_uvw(&last.pose) {
            return false;
        }
        if candidate.same_xyz(end_point) {
            return false;
        }

        let base = end_point.tran();
        let m = candidate.tran() - base;
        let mm = m.dot(&m);
        self.points.iter().all(|point| {
            let p = point.pose.tran();
            let t0 = (m.dot(&(p - base)) / mm).clamp(0.0, 1.0);
            let closest = base + t0 * m;
            (p - closest).mag() <= self.tolerance
        })
    }
}
