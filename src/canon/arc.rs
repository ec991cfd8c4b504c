// src/canon/arc.rs - arc geometry, chord tests and arc envelopes
use std::f64::consts::PI;

use canon_shared::Cartesian;
use serde::{Deserialize, Serialize};

use super::envelope::AxisLimits;
use super::units::ExternalUnits;

/// Radial overshoot tolerated before a chord test wraps the end angle.
const CHORD_WRAP_EPSILON: f64 = 1e-5;
/// Helical rise below this does not bring the axial axis limits in.
const MIN_AXIAL_TRAVEL: f64 = 0.001;

/// Active plane for arcs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    #[default]
    XY,
    YZ,
    XZ,
}

impl Plane {
    /// Axis indices of the first and second in-plane axes and the axial
    /// (helix) axis. Arc angles are measured from the first axis toward
    /// the second.
    pub fn axes(self) -> (usize, usize, usize) {
        match self {
            Plane::XY => (0, 1, 2),
            Plane::YZ => (1, 2, 0),
            Plane::XZ => (2, 0, 1),
        }
    }

    /// Unit normal of the plane before any XY rotation is applied.
    pub fn normal(self) -> Cartesian {
        match self {
            Plane::XY => Cartesian::new(0.0, 0.0, 1.0),
            Plane::YZ => Cartesian::new(1.0, 0.0, 0.0),
            Plane::XZ => Cartesian::new(0.0, 1.0, 0.0),
        }
    }
}

/// Moves `theta2` by whole turns until it lies on the correct side of
/// `theta1` for the direction of travel: strictly below for clockwise
/// (`rotation < 0`), strictly above otherwise. `epsilon` widens the band
/// that counts as "not yet past".
pub fn unwrap_end_angle(theta1: f64, theta2: f64, rotation: i32, epsilon: f64) -> f64 {
    let mut theta2 = theta2;
    for _ in 0..2 {
        let dth = theta2 - theta1;
        if rotation < 0 {
            if dth >= -epsilon {
                theta2 -= 2.0 * PI;
            }
        } else if dth <= epsilon {
            theta2 += 2.0 * PI;
        }
    }
    theta2
}

/// Signed angle swept from `theta1` to `theta2` in the direction given by
/// `rotation`. Coincident angles describe a full turn.
pub fn included_angle(theta1: f64, theta2: f64, rotation: i32) -> f64 {
    unwrap_end_angle(theta1, theta2, rotation, 0.0) - theta1
}

/// Turn count carried by a circular move message.
pub fn turn_count(rotation: i32) -> i32 {
    if rotation > 0 { rotation - 1 } else { rotation }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordDeviation {
    /// Maximum distance between the arc and its chord.
    pub deviation: f64,
    /// Angular midpoint of the arc.
    pub mid_x: f64,
    pub mid_y: f64,
}

/// How far an XY arc strays from the straight chord between its ends,
/// plus the arc's midpoint.
pub fn chord_deviation(sx: f64, sy: f64, ex: f64, ey: f64, cx: f64, cy: f64, rotation: i32) -> ChordDeviation {
    let th1 = (sy - cy).atan2(sx - cx);
    let th2 = unwrap_end_angle(th1, (ey - cy).atan2(ex - cx), rotation, CHORD_WRAP_EPSILON);
    let r = (sy - cy).hypot(sx - cx);

    let included = (th2 - th1).abs();
    let mid = (th2 + th1) / 2.0;
    ChordDeviation {
        deviation: r * (1.0 - (included / 2.0).cos()),
        mid_x: cx + r * mid.cos(),
        mid_y: cy + r * mid.sin(),
    }
}

/// Shape of a (possibly helical) arc in internal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    pub plane: Plane,
    pub radius: f64,
    /// Signed included angle in radians.
    pub angle: f64,
    /// Travel along the axial axis.
    pub axis_len: f64,
    /// Absolute A B C U V W displacements riding along with the arc.
    pub rider_deltas: [f64; 6],
}

impl ArcGeometry {
    pub fn helical_length(&self) -> f64 {
        (self.angle * self.radius).hypot(self.axis_len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcEnvelope {
    pub velocity: f64,
    pub ini_maxvel: f64,
    pub acceleration: f64,
}

const RIDER_AXES: [usize; 6] = [3, 4, 5, 6, 7, 8];

/// Velocity and acceleration limits for an arc.
///
/// In-plane speed is held to the slower of the two plane axes and to the
/// centripetal limit `sqrt(a * r)`. The axial axis joins in only when it
/// exists and the helix actually rises.
pub fn arc_envelope(limits: &AxisLimits, units: &ExternalUnits, geometry: &ArcGeometry, feed: f64) -> ArcEnvelope {
    let (first, second, axial) = geometry.plane.axes();
    let vel = |i| limits.velocity(i, units);
    let acc = |i| limits.acceleration(i, units);

    let mut ini_maxvel = vel(first).min(vel(second));
    let mut circ_maxvel = ini_maxvel;
    let circ_acc = acc(first).min(acc(second));
    let mut acceleration = circ_acc;
    let mut axial_maxvel = 0.0;
    if limits.is_valid(axial) && geometry.axis_len > MIN_AXIAL_TRAVEL {
        axial_maxvel = vel(axial);
        ini_maxvel = ini_maxvel.min(axial_maxvel);
        acceleration = acceleration.min(acc(axial));
    }

    let helical_length = geometry.helical_length();
    let rider_time = |limit: &dyn Fn(usize) -> f64| {
        RIDER_AXES
            .iter()
            .zip(geometry.rider_deltas.iter())
            .filter(|&(&axis, &d)| limits.is_valid(axis) && d != 0.0)
            .map(|(&axis, &d)| d / limit(axis))
            .fold(0.0, f64::max)
    };

    circ_maxvel = (circ_acc * geometry.radius).sqrt().min(circ_maxvel);
    let arc_length = (geometry.angle * geometry.radius).abs();
    let tcircle = if arc_length > 0.0 { arc_length / circ_maxvel } else { 0.0 };
    let mut tmax = tcircle;
    if axial_maxvel > 0.0 {
        tmax = tmax.max(geometry.axis_len / axial_maxvel);
    }
    tmax = tmax.max(rider_time(&vel));

    let mut velocity = feed;
    if tmax > 0.0 {
        ini_maxvel = helical_length / tmax;
        velocity = velocity.min(ini_maxvel);
    }

    let thelix = helical_length / acceleration;
    let tmax = thelix.max(rider_time(&acc));
    acceleration = if tmax > 0.0 { helical_length / tmax } else { 0.0 };

    ArcEnvelope { velocity, ini_maxvel, acceleration }
}
