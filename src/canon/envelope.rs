// src/canon/envelope.rs - straight-move velocity and acceleration limits
use canon_shared::{Pose, NUM_AXES};

use super::units::ExternalUnits;

/// Displacements below this are treated as no motion on that axis.
pub const TINY: f64 = 1e-7;

const LINEAR_AXES: [usize; 6] = [0, 1, 2, 6, 7, 8];
const ANGULAR_AXES: [usize; 3] = [3, 4, 5];

/// Per-axis limits in external units plus the mask of axes the machine has.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLimits {
    pub max_velocity: [f64; NUM_AXES],
    pub max_acceleration: [f64; NUM_AXES],
    /// Bit `i` set when axis `i` (x, y, z, a, b, c, u, v, w) exists.
    pub axis_mask: u32,
}

impl AxisLimits {
    /// Every axis present with the same limits.
    pub fn uniform(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity: [max_velocity; NUM_AXES],
            max_acceleration: [max_acceleration; NUM_AXES],
            axis_mask: (1 << NUM_AXES) - 1,
        }
    }

    pub fn is_valid(&self, axis: usize) -> bool {
        axis < NUM_AXES && self.axis_mask & (1 << axis) != 0
    }

    /// Velocity limit of `axis` in internal units.
    pub fn velocity(&self, axis: usize, units: &ExternalUnits) -> f64 {
        from_ext(axis, self.max_velocity[axis], units)
    }

    /// Acceleration limit of `axis` in internal units.
    pub fn acceleration(&self, axis: usize, units: &ExternalUnits) -> f64 {
        from_ext(axis, self.max_acceleration[axis], units)
    }
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self::uniform(100.0, 1000.0)
    }
}

fn from_ext(axis: usize, value: f64, units: &ExternalUnits) -> f64 {
    if ANGULAR_AXES.contains(&axis) {
        units.from_ext_ang(value)
    } else {
        units.from_ext_len(value)
    }
}

/// Which kind of axes a straight move displaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveClass {
    Stationary,
    Linear,
    Angular,
    Combined,
}

impl MoveClass {
    fn of(delta: &[f64; NUM_AXES]) -> Self {
        let cartesian = LINEAR_AXES.iter().any(|&i| delta[i] != 0.0);
        let angular = ANGULAR_AXES.iter().any(|&i| delta[i] != 0.0);
        match (cartesian, angular) {
            (false, false) => MoveClass::Stationary,
            (true, false) => MoveClass::Linear,
            (false, true) => MoveClass::Angular,
            (true, true) => MoveClass::Combined,
        }
    }

    fn governing_axes(self) -> &'static [usize] {
        match self {
            MoveClass::Stationary => &[],
            MoveClass::Linear => &LINEAR_AXES,
            MoveClass::Angular => &ANGULAR_AXES,
            MoveClass::Combined => &[0, 1, 2, 3, 4, 5, 6, 7, 8],
        }
    }

    /// Pure rotary moves report in angular units, everything else in length units.
    pub fn to_ext_velocity(self, velocity: f64, units: &ExternalUnits) -> f64 {
        match self {
            MoveClass::Angular => units.to_ext_ang(velocity),
            _ => units.to_ext_len(velocity),
        }
    }

    /// Caps a velocity by the programmed feed rate matching the move class.
    pub fn cap_velocity(self, velocity: f64, linear_feed: f64, angular_feed: f64) -> f64 {
        match self {
            MoveClass::Linear | MoveClass::Combined => velocity.min(linear_feed),
            MoveClass::Angular => velocity.min(angular_feed),
            MoveClass::Stationary => velocity,
        }
    }
}

/// Limits for one straight move, in internal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub velocity: f64,
    pub acceleration: f64,
    pub class: MoveClass,
}

/// Per-axis displacement, zeroed for absent axes and sub-`TINY` motion.
fn displacement(limits: &AxisLimits, from: &Pose, to: &Pose) -> [f64; NUM_AXES] {
    std::array::from_fn(|i| {
        let d = (to.axis(i) - from.axis(i)).abs();
        if !limits.is_valid(i) || d < TINY { 0.0 } else { d }
    })
}

/// Path length used as the numerator of the velocity and acceleration
/// ratios. XYZ governs whenever it moves; UVW stands in otherwise.
fn magnitude(delta: &[f64; NUM_AXES], class: MoveClass) -> f64 {
    let norm = |axes: [usize; 3]| axes.iter().map(|&i| delta[i] * delta[i]).sum::<f64>().sqrt();
    match class {
        MoveClass::Stationary => 0.0,
        MoveClass::Angular => norm([3, 4, 5]),
        MoveClass::Linear | MoveClass::Combined => {
            if delta[0] != 0.0 || delta[1] != 0.0 || delta[2] != 0.0 {
                norm([0, 1, 2])
            } else {
                norm([6, 7, 8])
            }
        }
    }
}

/// Computes straight-move envelopes from the axis limits.
pub struct EnvelopeSolver<'a> {
    limits: &'a AxisLimits,
    units: &'a ExternalUnits,
}

impl<'a> EnvelopeSolver<'a> {
    pub fn new(limits: &'a AxisLimits, units: &'a ExternalUnits) -> Self {
        Self { limits, units }
    }

    /// Slowest axis time over the axes that govern `class`.
    fn governing_time(&self, delta: &[f64; NUM_AXES], class: MoveClass, limit: impl Fn(usize) -> f64) -> f64 {
        class
            .governing_axes()
            .iter()
            .map(|&i| delta[i] / limit(i))
            .fold(0.0, f64::max)
    }

    /// Velocity the move could reach if only the axis limits applied.
    /// Falls back to the programmed feed rate when no axis moves.
    pub fn straight_velocity(&self, from: &Pose, to: &Pose, linear_feed: f64, angular_feed: f64) -> (f64, MoveClass) {
        let delta = displacement(self.limits, from, to);
        let class = MoveClass::of(&delta);
        let tmax = self.governing_time(&delta, class, |i| self.limits.velocity(i, self.units));
        let velocity = if tmax <= 0.0 {
            match class {
                MoveClass::Angular => angular_feed,
                _ => linear_feed,
            }
        } else {
            magnitude(&delta, class) / tmax
        };
        (velocity, class)
    }

    /// Acceleration ceiling for the move; zero when nothing moves.
    pub fn straight_acceleration(&self, from: &Pose, to: &Pose) -> (f64, MoveClass) {
        let delta = displacement(self.limits, from, to);
        let class = MoveClass::of(&delta);
        let tmax = self.governing_time(&delta, class, |i| self.limits.acceleration(i, self.units));
        let acceleration = if tmax > 0.0 { magnitude(&delta, class) / tmax } else { 0.0 };
        (acceleration, class)
    }

    pub fn solve(&self, from: &Pose, to: &Pose, linear_feed: f64, angular_feed: f64) -> Envelope {
        let (velocity, class) = self.straight_velocity(from, to, linear_feed, angular_feed);
        let (acceleration, _) = self.straight_acceleration(from, to);
        Envelope { velocity, acceleration, class }
    }
}

impl Envelope {
    pub fn capped_velocity(&self, linear_feed: f64, angular_feed: f64) -> f64 {
        self.class.cap_velocity(self.velocity, linear_feed, angular_feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> AxisLimits {
        let mut limits = AxisLimits::uniform(100.0, 1000.0);
        limits.max_velocity[2] = 10.0;
        limits.max_acceleration[2] = 50.0;
        limits.max_velocity[3] = 360.0;
        limits
    }

    #[test]
    fn test_single_axis_move_hits_axis_limit() {
        let limits = limits();
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        let env = solver.solve(&Pose::ZERO, &Pose::xyz(10.0, 0.0, 0.0), 50.0, 50.0);
        assert_eq!(env.class, MoveClass::Linear);
        assert!((env.velocity - 100.0).abs() < 1e-9);
        assert!((env.acceleration - 1000.0).abs() < 1e-9);
        assert_eq!(env.capped_velocity(50.0, 0.0), 50.0);
    }

    #[test]
    fn test_slow_axis_governs_diagonal() {
        let limits = limits();
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        // Z needs 1s at 10/s; X covers 10 in the same second.
        let env = solver.solve(&Pose::ZERO, &Pose::xyz(10.0, 0.0, 10.0), 1e9, 1e9);
        let length = 200.0f64.sqrt();
        assert!((env.velocity - length / 1.0).abs() < 1e-9);
        assert!((env.acceleration - length / 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_displacement_has_zero_acceleration() {
        let limits = limits();
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        let p = Pose::xyz(1.0, 2.0, 3.0);
        let env = solver.solve(&p, &p, 42.0, 7.0);
        assert_eq!(env.class, MoveClass::Stationary);
        assert_eq!(env.velocity, 42.0);
        assert_eq!(env.acceleration, 0.0);
    }

    #[test]
    fn test_invalid_axes_and_tiny_motion_are_ignored() {
        let mut limits = limits();
        limits.axis_mask = 0b111;
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        let to = Pose { x: 5e-8, a: 90.0, u: 4.0, ..Pose::ZERO };
        let env = solver.solve(&Pose::ZERO, &to, 10.0, 20.0);
        assert_eq!(env.class, MoveClass::Stationary);
        assert_eq!(env.acceleration, 0.0);
    }

    #[test]
    fn test_pure_rotary_move_uses_angular_feed_and_units() {
        let limits = limits();
        let (units, _) = ExternalUnits::sanitized(1.0, 2.0);
        let solver = EnvelopeSolver::new(&limits, &units);
        let env = solver.solve(&Pose::ZERO, &Pose { a: 90.0, ..Pose::ZERO }, 10.0, 20.0);
        assert_eq!(env.class, MoveClass::Angular);
        // 360 external deg/s at 2 ext per degree is 180 deg/s internally.
        assert!((env.velocity - 180.0).abs() < 1e-9);
        assert_eq!(env.capped_velocity(10.0, 20.0), 20.0);
        assert_eq!(env.class.to_ext_velocity(20.0, &units), 40.0);
    }

    #[test]
    fn test_uvw_governs_when_xyz_is_still() {
        let limits = limits();
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        let to = Pose { u: 3.0, v: 4.0, ..Pose::ZERO };
        let env = solver.solve(&Pose::ZERO, &to, 1e9, 1e9);
        assert_eq!(env.class, MoveClass::Linear);
        // slowest axis V: 4 / 100 = 0.04s over a length of 5.
        assert!((env.velocity - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_longer_move_never_lowers_velocity() {
        let limits = limits();
        let units = ExternalUnits::default();
        let solver = EnvelopeSolver::new(&limits, &units);
        let mut previous = 0.0;
        for step in 1..20 {
            let d = step as f64;
            let env = solver.solve(&Pose::ZERO, &Pose::xyz(d, d * 0.5, 0.0), 1e9, 1e9);
            assert!(env.velocity + 1e-9 >= previous);
            previous = env.velocity;
        }
    }

    #[test]
    fn test_raising_a_limit_never_lowers_velocity() {
        let units = ExternalUnits::default();
        let target = Pose::new(10.0, 4.0, 2.0, 30.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let mut limits = limits();
        let mut previous = 0.0;
        for vmax in [1.0, 5.0, 20.0, 80.0, 500.0] {
            limits.max_velocity[0] = vmax;
            let env = EnvelopeSolver::new(&limits, &units).solve(&Pose::ZERO, &target, 1e9, 1e9);
            assert!(env.velocity + 1e-9 >= previous);
            previous = env.velocity;
        }
    }
}
