// src/canon/emitter.rs - canonical call session
use std::f64::consts::PI;
use std::fs::{File, OpenOptions};
use std::io::Write;

use canon_shared::{Cartesian, Pose};

use super::arc::{self, ArcGeometry, Plane};
use super::call::ArcCommand;
use super::coalesce::{ChainedPoint, SegmentChain};
use super::envelope::{Envelope, EnvelopeSolver};
use super::message::{
    truncate_text, InputType, InterpList, MotionType, QueuedMessage, TermCondition, ToolEntry, TrajMessage, WaitType,
    MAX_TEXT_LEN,
};
use super::nurbs::{biarc, ControlPoint, NurbsCurve, PlanarStep};
use super::offsets::{rotate_vector, OffsetStack};
use super::units::{to_internal, to_program, ExternalUnits, LengthUnits};
use super::{CanonError, CanonSettings, MotionMode, MAX_AUX_INPUTS};

/// One translation session: everything the canonical calls mutate.
///
/// All positions held here are absolute and internal (mm, degrees). The
/// end point is the last position handed to the planner; buffered feeds
/// in the segment chain lie beyond it.
pub struct Canon {
    settings: CanonSettings,
    units: ExternalUnits,
    program_units: LengthUnits,
    offsets: OffsetStack,
    end_point: Pose,
    chain: SegmentChain,
    plane: Plane,
    motion_mode: MotionMode,
    motion_tolerance: f64,
    feed_per_revolution: bool,
    synched: bool,
    linear_feed_rate: f64,
    angular_feed_rate: f64,
    spindle_speed: f64,
    spindle_dir: i32,
    css_maximum: f64,
    css_numerator: f64,
    rotary_unlock_for_traverse: Option<usize>,
    optional_program_stop: bool,
    block_delete: bool,
    probe_file: Option<File>,
    last_probed: Option<Pose>,
    log_file: Option<File>,
    queue: InterpList,
}

impl Canon {
    /// Builds a session. Zero external unit scales are replaced by 1.0 and
    /// reported as operator errors in the queue.
    pub fn new(settings: CanonSettings) -> Self {
        let (units, faults) = ExternalUnits::sanitized(settings.linear_units, settings.angular_units);
        let chain = SegmentChain::new(settings.naivecam_tolerance);
        let mut canon = Self {
            settings,
            units,
            program_units: LengthUnits::Millimeters,
            offsets: OffsetStack::default(),
            end_point: Pose::ZERO,
            chain,
            plane: Plane::XY,
            motion_mode: MotionMode::Continuous,
            motion_tolerance: 0.0,
            feed_per_revolution: false,
            synched: false,
            linear_feed_rate: 0.0,
            angular_feed_rate: 0.0,
            spindle_speed: 0.0,
            spindle_dir: 0,
            css_maximum: 0.0,
            css_numerator: 0.0,
            rotary_unlock_for_traverse: None,
            optional_program_stop: true,
            block_delete: true,
            probe_file: None,
            last_probed: None,
            log_file: None,
            queue: InterpList::new(),
        };
        for fault in faults {
            tracing::error!("{}", fault);
            canon.canon_error(&fault);
        }
        canon
    }

    /// Resets the session to power-on state and re-selects blended motion.
    pub fn init_canon(&mut self) {
        self.chain.clear();
        self.offsets = OffsetStack::default();
        self.end_point = Pose::ZERO;
        self.plane = Plane::XY;
        self.feed_per_revolution = false;
        self.synched = false;
        self.linear_feed_rate = 0.0;
        self.angular_feed_rate = 0.0;
        self.spindle_speed = 0.0;
        self.spindle_dir = 0;
        self.css_maximum = 0.0;
        self.css_numerator = 0.0;
        self.rotary_unlock_for_traverse = None;
        self.optional_program_stop = true;
        self.block_delete = true;

        let linear = self.units.linear();
        self.program_units = if (linear - 1.0 / 25.4).abs() < 1e-9 {
            LengthUnits::Inches
        } else if (linear - 1.0).abs() < 1e-9 {
            LengthUnits::Millimeters
        } else {
            self.canon_error("non-standard length units, setting interpreter to mm");
            LengthUnits::Millimeters
        };
        self.set_naivecam_tolerance(self.settings.naivecam_tolerance);
        self.set_motion_control_mode(MotionMode::Continuous, 0.0);
    }

    /// End of input: push out whatever is still buffered.
    pub fn finish(&mut self) {
        self.flush_segments();
    }

    fn from_program(&self, pose: &Pose) -> Pose {
        self.offsets.apply_offsets(&to_internal(pose, self.program_units))
    }

    fn to_program_coords(&self, pose: &Pose) -> Pose {
        to_program(&self.offsets.remove_offsets(pose), self.program_units)
    }

    fn envelope(&self, to: &Pose) -> Envelope {
        EnvelopeSolver::new(&self.settings.limits, &self.units).solve(
            &self.end_point,
            to,
            self.linear_feed_rate,
            self.angular_feed_rate,
        )
    }

    /// Zero-rate moves are dropped unless position is slaved to the spindle.
    fn motion_allowed(&self, vel: f64, acc: f64) -> bool {
        (vel != 0.0 && acc != 0.0) || self.synched
    }

    fn linear_move(
        &self,
        end: &Pose,
        vel: f64,
        env: &Envelope,
        motion_type: MotionType,
        feed_per_revolution: bool,
        index_rotary: Option<usize>,
    ) -> TrajMessage {
        TrajMessage::LinearMove {
            end: self.units.to_external(end),
            vel: env.class.to_ext_velocity(vel, &self.units),
            ini_maxvel: env.class.to_ext_velocity(env.velocity, &self.units),
            acc: env.class.to_ext_velocity(env.acceleration, &self.units),
            motion_type,
            feed_per_revolution,
            index_rotary,
        }
    }

    fn append(&mut self, message: TrajMessage) {
        self.queue.append(message);
    }

    /// Appends a move that must not run spindle-synchronized, stopping and
    /// restarting synchronization around it. The stop keeps the line of the
    /// motion it ends.
    fn append_unsynched(&mut self, line: i32, message: Option<TrajMessage>) {
        let restart = self.feed_per_revolution;
        if restart {
            self.stop_speed_feed_synch();
        }
        self.queue.set_line_number(line);
        if let Some(message) = message {
            self.append(message);
        }
        if restart {
            self.start_speed_feed_synch(self.linear_feed_rate, true);
        }
    }

    // Units, plane, blending

    pub fn use_length_units(&mut self, units: LengthUnits) {
        self.program_units = units;
    }

    pub fn select_plane(&mut self, plane: Plane) {
        self.plane = plane;
    }

    /// Tolerance in program units; zero disables segment chaining.
    pub fn set_naivecam_tolerance(&mut self, tolerance: f64) {
        self.chain.set_tolerance(self.program_units.from_prog_len(tolerance));
    }

    pub fn set_motion_control_mode(&mut self, mode: MotionMode, tolerance: f64) {
        self.flush_segments();
        self.motion_mode = mode;
        self.motion_tolerance = self.program_units.from_prog_len(tolerance);
        let message = if mode == MotionMode::Continuous {
            TrajMessage::SetTermCond {
                cond: TermCondition::Blend,
                tolerance: self.units.to_ext_len(self.motion_tolerance),
            }
        } else {
            TrajMessage::SetTermCond {
                cond: TermCondition::Stop,
                tolerance: 0.0,
            }
        };
        self.append(message);
    }

    // Offsets

    pub fn set_g5x_offset(&mut self, index: i32, origin: &Pose) {
        self.flush_segments();
        self.offsets.g5x = to_internal(origin, self.program_units);
        let message = TrajMessage::SetG5x {
            index,
            origin: self.units.to_external(&self.offsets.g5x),
        };
        self.reissue_css_speed();
        self.append(message);
    }

    pub fn set_g92_offset(&mut self, origin: &Pose) {
        self.flush_segments();
        self.offsets.g92 = to_internal(origin, self.program_units);
        let message = TrajMessage::SetG92 {
            origin: self.units.to_external(&self.offsets.g92),
        };
        self.reissue_css_speed();
        self.append(message);
    }

    pub fn set_xy_rotation(&mut self, degrees: f64) {
        self.flush_segments();
        self.append(TrajMessage::SetRotation { rotation: degrees });
        self.offsets.xy_rotation = degrees;
    }

    pub fn use_tool_length_offset(&mut self, offset: &Pose) {
        self.flush_segments();
        self.offsets.tool = to_internal(offset, self.program_units);
        let message = TrajMessage::SetToolOffset {
            offset: self.units.to_external(&self.offsets.tool),
        };
        self.reissue_css_speed();
        self.append(message);
    }

    /// Constant surface speed depends on the X offset, so the spindle
    /// command is repeated whenever an offset moves.
    fn reissue_css_speed(&mut self) {
        if self.css_maximum != 0.0 {
            self.set_spindle_speed(self.spindle_speed);
        }
    }

    // Feed

    /// Rate in program units per minute, or per revolution in
    /// feed-per-revolution mode.
    pub fn set_feed_rate(&mut self, rate: f64) {
        if self.feed_per_revolution {
            self.start_speed_feed_synch(rate, true);
            self.linear_feed_rate = rate;
            return;
        }
        let per_second = rate / 60.0;
        let linear = self.program_units.from_prog_len(per_second);
        if linear != self.linear_feed_rate || per_second != self.angular_feed_rate {
            self.flush_segments();
        }
        self.linear_feed_rate = linear;
        self.angular_feed_rate = per_second;
    }

    pub fn set_feed_mode(&mut self, feed_per_revolution: bool) {
        self.flush_segments();
        self.feed_per_revolution = feed_per_revolution;
        if !feed_per_revolution {
            self.stop_speed_feed_synch();
        }
    }

    pub fn start_speed_feed_synch(&mut self, feed_per_revolution: f64, velocity_mode: bool) {
        self.flush_segments();
        let fpr = self.units.to_ext_len(self.program_units.from_prog_len(feed_per_revolution));
        self.append(TrajMessage::SpindleSync {
            feed_per_revolution: fpr,
            velocity_mode,
        });
        self.synched = true;
    }

    pub fn stop_speed_feed_synch(&mut self) {
        self.flush_segments();
        self.append(TrajMessage::SpindleSync {
            feed_per_revolution: 0.0,
            velocity_mode: false,
        });
        self.synched = false;
    }

    // Motion

    pub fn straight_traverse(&mut self, line: i32, target: &Pose) {
        self.flush_segments();
        let target = self.from_program(target);
        let env = self.envelope(&target);
        let motion_type = if self.rotary_unlock_for_traverse.is_some() {
            MotionType::IndexRotary
        } else {
            MotionType::Traverse
        };
        let message = self.linear_move(&target, env.velocity, &env, motion_type, false, self.rotary_unlock_for_traverse);
        let keep = env.velocity != 0.0 && env.acceleration != 0.0;
        self.append_unsynched(line, keep.then_some(message));
        self.end_point = target;
    }

    pub fn straight_feed(&mut self, line: i32, target: &Pose) {
        let target = self.from_program(target);
        self.see_segment(line, target);
    }

    /// Offers an absolute feed target to the segment chain.
    fn see_segment(&mut self, line: i32, pose: Pose) {
        let changed_riders = !pose.same_abc(&self.end_point) || !pose.same_uvw(&self.end_point);
        let blending = self.motion_mode == MotionMode::Continuous;
        if !self.chain.is_empty() && !self.chain.linkable(&pose, &self.end_point, blending) {
            tracing::debug!("line {}: segment does not chain, flushing {} points", line, self.chain.len());
            self.flush_segments();
        }
        self.chain.push(ChainedPoint { pose, line_number: line });
        if changed_riders {
            self.flush_segments();
        }
    }

    /// Emits the buffered chain as one feed move ending at its last point.
    pub fn flush_segments(&mut self) {
        let Some(point) = self.chain.take_last() else {
            return;
        };
        let env = self.envelope(&point.pose);
        let vel = env.capped_velocity(self.linear_feed_rate, self.angular_feed_rate);
        tracing::debug!(
            "feed to {:?}: vel {} (limit {}), acc {}",
            point.pose,
            vel,
            env.velocity,
            env.acceleration
        );
        if self.motion_allowed(vel, env.acceleration) {
            let message = self.linear_move(&point.pose, vel, &env, MotionType::Feed, self.feed_per_revolution, None);
            self.queue.set_line_number(point.line_number);
            self.append(message);
        }
        self.end_point = point.pose;
    }

    /// Spindle-synchronized tap along XYZ. The tap reverses back out, so
    /// the end point does not move.
    pub fn rigid_tap(&mut self, line: i32, x: f64, y: f64, z: f64) {
        self.flush_segments();
        let p = self.from_program(&Pose::xyz(x, y, z));
        let target = Pose { x: p.x, y: p.y, z: p.z, ..self.end_point };
        let env = self.envelope(&target);
        if env.velocity != 0.0 && env.acceleration != 0.0 {
            let pos = self.units.to_external(&target).tran();
            let message = TrajMessage::RigidTap {
                pos,
                vel: env.class.to_ext_velocity(env.velocity, &self.units),
                ini_maxvel: env.class.to_ext_velocity(env.velocity, &self.units),
                acc: env.class.to_ext_velocity(env.acceleration, &self.units),
            };
            self.queue.set_line_number(line);
            self.append(message);
        }
    }

    pub fn straight_probe(&mut self, line: i32, target: &Pose, probe_type: u8) {
        self.flush_segments();
        let target = self.from_program(target);
        let env = self.envelope(&target);
        let vel = env.capped_velocity(self.linear_feed_rate, self.angular_feed_rate);
        if vel != 0.0 && env.acceleration != 0.0 {
            let message = TrajMessage::Probe {
                pos: self.units.to_external(&target),
                vel: env.class.to_ext_velocity(vel, &self.units),
                ini_maxvel: env.class.to_ext_velocity(env.velocity, &self.units),
                acc: env.class.to_ext_velocity(env.acceleration, &self.units),
                probe_type,
            };
            self.queue.set_line_number(line);
            self.append(message);
        }
        self.end_point = target;
    }

    pub fn arc_feed(&mut self, line: i32, cmd: &ArcCommand) {
        let pu = self.program_units;
        let riders = self.offsets.apply_offsets(&Pose {
            a: cmd.a,
            b: cmd.b,
            c: cmd.c,
            u: pu.from_prog_len(cmd.u),
            v: pu.from_prog_len(cmd.v),
            w: pu.from_prog_len(cmd.w),
            ..Pose::ZERO
        });
        let with_riders = |p: Cartesian, riders: &Pose| Pose { x: p.x, y: p.y, z: p.z, ..*riders };

        if self.plane == Plane::XY && self.motion_mode == MotionMode::Continuous {
            let last = self.chain.last().map(|p| p.pose).unwrap_or(self.end_point);
            let end = self.from_program(&Pose::xyz(cmd.first_end, cmd.second_end, cmd.axis_end_point));
            let center = self.from_program(&Pose::xyz(cmd.first_axis, cmd.second_axis, 0.0));
            let chord = arc::chord_deviation(last.x, last.y, end.x, end.y, center.x, center.y, cmd.rotation);
            if chord.deviation < self.chain.tolerance() {
                let mut mid = Pose::from_array(std::array::from_fn(|i| (self.end_point.axis(i) + riders.axis(i)) / 2.0));
                mid.x = chord.mid_x;
                mid.y = chord.mid_y;
                mid.z = (last.z + end.z) / 2.0;
                self.see_segment(line, mid);
                self.see_segment(line, with_riders(end.tran(), &riders));
                return;
            }
        }

        self.flush_segments();
        let (first, second, axial) = self.plane.axes();
        let mut end = Pose::ZERO;
        end.set_axis(first, cmd.first_end);
        end.set_axis(second, cmd.second_end);
        end.set_axis(axial, cmd.axis_end_point);
        let mut center = end;
        center.set_axis(first, cmd.first_axis);
        center.set_axis(second, cmd.second_axis);
        let end = with_riders(self.from_program(&end).tran(), &riders);
        let center = self.from_program(&center);
        let normal = rotate_vector(self.plane.normal(), self.offsets.xy_rotation);

        let start = self.end_point;
        let (s1, s2) = (start.axis(first) - center.axis(first), start.axis(second) - center.axis(second));
        let theta1 = s2.atan2(s1);
        let theta2 = (end.axis(second) - center.axis(second)).atan2(end.axis(first) - center.axis(first));
        let geometry = ArcGeometry {
            plane: self.plane,
            radius: s1.hypot(s2),
            angle: arc::included_angle(theta1, theta2, cmd.rotation),
            axis_len: (end.axis(axial) - start.axis(axial)).abs(),
            rider_deltas: std::array::from_fn(|i| (end.axis(i + 3) - start.axis(i + 3)).abs()),
        };
        let env = arc::arc_envelope(&self.settings.limits, &self.units, &geometry, self.linear_feed_rate);
        tracing::debug!(
            "arc r {} angle {}: vel {} ini_maxvel {} acc {}",
            geometry.radius,
            geometry.angle,
            env.velocity,
            env.ini_maxvel,
            env.acceleration
        );

        let ext = |v: f64| self.units.to_ext_len(v);
        let message = if cmd.rotation == 0 {
            TrajMessage::LinearMove {
                end: self.units.to_external(&end),
                vel: ext(env.velocity),
                ini_maxvel: ext(env.ini_maxvel),
                acc: ext(env.acceleration),
                motion_type: MotionType::Arc,
                feed_per_revolution: self.feed_per_revolution,
                index_rotary: None,
            }
        } else {
            TrajMessage::CircularMove {
                end: self.units.to_external(&end),
                center: Cartesian::new(ext(center.x), ext(center.y), ext(center.z)),
                normal,
                turn: arc::turn_count(cmd.rotation),
                vel: ext(env.velocity),
                ini_maxvel: ext(env.ini_maxvel),
                acc: ext(env.acceleration),
                motion_type: MotionType::Arc,
                feed_per_revolution: self.feed_per_revolution,
            }
        };
        if self.motion_allowed(env.velocity, env.acceleration) {
            self.queue.set_line_number(line);
            self.append(message);
        }
        self.end_point = end;
    }

    /// Planar NURBS in the XY plane, fitted with biarcs between samples.
    /// `order` is the spline degree plus one.
    pub fn nurbs_feed(&mut self, line: i32, control_points: &[ControlPoint], order: usize) {
        self.flush_segments();
        let Some(curve) = NurbsCurve::new(control_points.to_vec(), order) else {
            tracing::warn!(
                "line {}: ignoring NURBS with {} control points of order {}",
                line,
                control_points.len(),
                order
            );
            return;
        };
        let samples = curve.samples();
        for pair in samples.windows(2) {
            let ((p0, t0), (p1, t1)) = (pair[0], pair[1]);
            let Some(steps) = biarc(p0, t0, p1, t1, 1.0) else {
                continue;
            };
            for step in steps {
                self.planar_step(line, step);
            }
        }
    }

    fn planar_step(&mut self, line: i32, step: PlanarStep) {
        let here = self.to_program_coords(&self.end_point);
        match step {
            PlanarStep::Arc { end, center, rotation } => {
                let cmd = ArcCommand {
                    first_end: end.x,
                    second_end: end.y,
                    first_axis: center.x,
                    second_axis: center.y,
                    rotation,
                    axis_end_point: here.z,
                    a: here.a,
                    b: here.b,
                    c: here.c,
                    u: here.u,
                    v: here.v,
                    w: here.w,
                };
                self.arc_feed(line, &cmd);
            }
            PlanarStep::Line { end } => {
                let target = Pose { x: end.x, y: end.y, ..here };
                self.straight_feed(line, &target);
            }
        }
    }

    pub fn dwell(&mut self, seconds: f64) {
        self.flush_segments();
        self.append(TrajMessage::Delay { seconds });
    }

    // Rotary indexing

    /// Breaks blending with a zero-length move and marks the next traverse
    /// as an indexing move for `axis`.
    pub fn unlock_rotary(&mut self, line: i32, axis: usize) {
        self.flush_segments();
        let message = TrajMessage::LinearMove {
            end: self.units.to_external(&self.end_point),
            vel: 1.0,
            ini_maxvel: 1.0,
            acc: 1.0,
            motion_type: MotionType::Traverse,
            feed_per_revolution: false,
            index_rotary: None,
        };
        self.append_unsynched(line, Some(message));
        self.rotary_unlock_for_traverse = Some(axis);
    }

    pub fn lock_rotary(&mut self, axis: usize) {
        tracing::debug!("locking rotary axis {}", axis);
        self.rotary_unlock_for_traverse = None;
    }

    // Spindle

    /// Nonzero `css_maximum` selects constant surface speed with that
    /// spindle ceiling; zero selects plain RPM.
    pub fn set_spindle_mode(&mut self, css_maximum: f64) {
        self.css_maximum = css_maximum.abs();
    }

    fn spindle_parameters(&mut self) -> (f64, f64, f64) {
        let dir = self.spindle_dir as f64;
        if self.css_maximum != 0.0 {
            self.css_numerator = if self.program_units == LengthUnits::Inches {
                12.0 / (2.0 * PI) * self.spindle_speed * self.units.to_ext_len(25.4)
            } else {
                1000.0 / (2.0 * PI) * self.spindle_speed * self.units.to_ext_len(1.0)
            };
            (
                dir * self.css_maximum,
                dir * self.css_numerator,
                self.units.to_ext_len(self.offsets.total_x()),
            )
        } else {
            self.css_numerator = 0.0;
            (dir * self.spindle_speed, 0.0, 0.0)
        }
    }

    fn start_spindle(&mut self, dir: i32) {
        self.flush_segments();
        self.spindle_dir = dir;
        let (speed, factor, xoffset) = self.spindle_parameters();
        self.append(TrajMessage::SpindleOn { speed, factor, xoffset });
    }

    pub fn start_spindle_clockwise(&mut self) {
        self.start_spindle(1);
    }

    pub fn start_spindle_counterclockwise(&mut self) {
        self.start_spindle(-1);
    }

    /// RPM, or surface speed when CSS is active.
    pub fn set_spindle_speed(&mut self, speed: f64) {
        self.spindle_speed = speed.abs();
        self.flush_segments();
        let (speed, factor, xoffset) = self.spindle_parameters();
        self.append(TrajMessage::SpindleSpeed { speed, factor, xoffset });
    }

    pub fn stop_spindle_turning(&mut self) {
        self.flush_segments();
        self.spindle_dir = 0;
        self.append(TrajMessage::SpindleOff);
    }

    pub fn orient_spindle(&mut self, orientation: f64, mode: i32) {
        self.flush_segments();
        self.append(TrajMessage::SpindleOrient { orientation, mode });
    }

    pub fn wait_spindle_orient_complete(&mut self, timeout: f64) {
        self.flush_segments();
        self.append(TrajMessage::SpindleWaitOrient { timeout });
    }

    // Tools

    pub fn set_tool_table_entry(&mut self, entry: ToolEntry) {
        self.flush_segments();
        self.append(TrajMessage::ToolSetOffset { entry });
    }

    pub fn start_change(&mut self) {
        self.flush_segments();
        self.append(TrajMessage::ToolStartChange);
    }

    pub fn change_tool(&mut self, slot: i32) {
        self.flush_segments();
        tracing::info!("changing tool, pocket {}", slot);
        if let Some(position) = self.settings.tool_change_position {
            let target = self.units.from_external(&position);
            let env = self.envelope(&target);
            let message = self.linear_move(&target, env.velocity, &env, MotionType::ToolChange, false, None);
            let keep = env.velocity != 0.0 && env.acceleration != 0.0;
            self.append_unsynched(self.queue.line_number(), keep.then_some(message));
            self.end_point = target;
        }
        self.append(TrajMessage::ToolLoad);
    }

    pub fn select_pocket(&mut self, pocket: i32, tool: i32) {
        self.flush_segments();
        self.append(TrajMessage::ToolPrepare { pocket, tool });
    }

    pub fn change_tool_number(&mut self, tool: i32) {
        self.flush_segments();
        self.append(TrajMessage::ToolSetNumber { tool });
    }

    // Overrides, holds, coolant

    pub fn set_feed_override(&mut self, enabled: bool) {
        self.flush_segments();
        self.append(TrajMessage::FeedOverrideEnable { enabled });
    }

    pub fn set_spindle_override(&mut self, enabled: bool) {
        self.flush_segments();
        self.append(TrajMessage::SpindleOverrideEnable { enabled });
    }

    pub fn set_adaptive_feed(&mut self, enabled: bool) {
        self.flush_segments();
        self.append(TrajMessage::AdaptiveFeed { enabled });
    }

    pub fn set_feed_hold(&mut self, enabled: bool) {
        self.flush_segments();
        self.append(TrajMessage::FeedHoldEnable { enabled });
    }

    pub fn set_flood(&mut self, on: bool) {
        self.flush_segments();
        self.append(TrajMessage::CoolantFlood { on });
    }

    pub fn set_mist(&mut self, on: bool) {
        self.flush_segments();
        self.append(TrajMessage::CoolantMist { on });
    }

    // I/O

    fn digital_output(&mut self, index: u32, value: bool, now: bool) {
        self.flush_segments();
        self.append(TrajMessage::SetDigitalOutput {
            index,
            start: value,
            end: value,
            now,
        });
    }

    fn analog_output(&mut self, index: u32, value: f64, now: bool) {
        self.flush_segments();
        self.append(TrajMessage::SetAnalogOutput {
            index,
            start: value,
            end: value,
            now,
        });
    }

    /// Output synchronized with the start of the next move.
    pub fn set_motion_output_bit(&mut self, index: u32) {
        self.digital_output(index, true, false);
    }

    pub fn clear_motion_output_bit(&mut self, index: u32) {
        self.digital_output(index, false, false);
    }

    /// Output set immediately.
    pub fn set_aux_output_bit(&mut self, index: u32) {
        self.digital_output(index, true, true);
    }

    pub fn clear_aux_output_bit(&mut self, index: u32) {
        self.digital_output(index, false, true);
    }

    pub fn set_motion_output_value(&mut self, index: u32, value: f64) {
        self.analog_output(index, value, false);
    }

    pub fn set_aux_output_value(&mut self, index: u32, value: f64) {
        self.analog_output(index, value, true);
    }

    pub fn wait(&mut self, index: i32, input_type: InputType, wait_type: WaitType, timeout: f64) -> Result<(), CanonError> {
        if !(0..MAX_AUX_INPUTS).contains(&index) {
            return Err(CanonError::InputIndex { kind: input_type, index });
        }
        self.flush_segments();
        self.append(TrajMessage::AuxInputWait {
            index: index as u32,
            input_type,
            wait_type,
            timeout,
        });
        Ok(())
    }

    // Program flow

    pub fn program_stop(&mut self) {
        self.flush_segments();
        self.append(TrajMessage::PlanPause);
    }

    pub fn optional_program_stop(&mut self) {
        self.flush_segments();
        self.append(TrajMessage::PlanOptionalStop);
    }

    pub fn program_end(&mut self) {
        self.flush_segments();
        tracing::info!("program end at line {}", self.queue.line_number());
        self.append(TrajMessage::PlanEnd);
    }

    pub fn set_optional_program_stop(&mut self, enabled: bool) {
        self.optional_program_stop = enabled;
    }

    pub fn get_optional_program_stop(&self) -> bool {
        self.optional_program_stop
    }

    pub fn set_block_delete(&mut self, enabled: bool) {
        self.block_delete = enabled;
    }

    pub fn get_block_delete(&self) -> bool {
        self.block_delete
    }

    pub fn turn_probe_on(&mut self) {
        self.append(TrajMessage::ClearProbeTripped);
    }

    pub fn turn_probe_off(&mut self) {}

    // Operator text and logs

    pub fn message(&mut self, text: &str) {
        self.flush_segments();
        self.append(TrajMessage::OperatorDisplay {
            text: truncate_text(text, MAX_TEXT_LEN),
        });
    }

    pub fn canon_error(&mut self, text: &str) {
        self.flush_segments();
        self.append(TrajMessage::OperatorError {
            text: truncate_text(text, MAX_TEXT_LEN),
        });
    }

    /// Program comments. Only the probe-file hot comments act.
    pub fn comment(&mut self, text: &str) {
        if let Some(rest) = text.strip_prefix("PROBEOPEN") {
            let name = rest.trim();
            match File::create(name) {
                Ok(file) => {
                    tracing::info!("probe results go to {}", name);
                    self.probe_file = Some(file);
                    self.last_probed = None;
                }
                Err(e) => {
                    tracing::warn!("Failed to open probe file '{}': {}", name, e);
                    self.canon_error(&format!("Unable to open file {name} for writing"));
                }
            }
        } else if text.starts_with("PROBECLOSE") {
            self.probe_file = None;
        }
    }

    pub fn log_open(&mut self, path: &str) -> Result<(), CanonError> {
        self.log_file = Some(File::create(path)?);
        tracing::info!("log file {} opened", path);
        Ok(())
    }

    pub fn log_append(&mut self, path: &str) -> Result<(), CanonError> {
        self.log_file = Some(OpenOptions::new().create(true).append(true).open(path)?);
        tracing::info!("log file {} opened for append", path);
        Ok(())
    }

    pub fn log_close(&mut self) {
        if self.log_file.take().is_some() {
            tracing::info!("log file closed");
        }
    }

    pub fn log(&mut self, text: &str) -> Result<(), CanonError> {
        if let Some(file) = self.log_file.as_mut() {
            writeln!(file, "{text}")?;
            file.flush()?;
        }
        Ok(())
    }

    // Plugins

    fn plugin_payload(&self, payload: &[u8]) -> Vec<u8> {
        let max = self.settings.max_plugin_call_len;
        if payload.len() > max {
            tracing::warn!("plugin call of {} bytes truncated to {}", payload.len(), max);
        }
        payload[..payload.len().min(max)].to_vec()
    }

    pub fn plugin_call(&mut self, payload: &[u8]) {
        self.flush_segments();
        let call = self.plugin_payload(payload);
        self.append(TrajMessage::PluginCall { call, len: payload.len() });
    }

    pub fn io_plugin_call(&mut self, payload: &[u8]) {
        self.flush_segments();
        let call = self.plugin_payload(payload);
        self.append(TrajMessage::IoPluginCall { call, len: payload.len() });
    }

    // Queries

    /// Adopts the controller's reported position as the end point and
    /// returns it in program coordinates. Buffered feeds are discarded.
    pub fn external_position(&mut self, machine: &Pose) -> Pose {
        self.chain.clear();
        self.end_point = self.units.from_external(machine);
        self.to_program_coords(&self.end_point)
    }

    /// Converts a probe trip position to program coordinates, recording
    /// new positions in the open probe file.
    pub fn external_probe_position(&mut self, probed: &Pose) -> Pose {
        self.flush_segments();
        let pos = self.to_program_coords(&self.units.from_external(probed));
        if self.last_probed != Some(pos) {
            if let Some(file) = self.probe_file.as_mut() {
                let line = pos.to_array().map(|v| format!("{v:.6}")).join(" ");
                if let Err(e) = writeln!(file, "{line}") {
                    tracing::warn!("Failed to write probe file: {}", e);
                }
            }
            self.last_probed = Some(pos);
        }
        pos
    }

    /// Program units per minute.
    pub fn feed_rate(&self) -> f64 {
        self.program_units.to_prog_len(self.linear_feed_rate) * 60.0
    }

    pub fn tool_length_offset(&self) -> Pose {
        to_program(&self.offsets.tool, self.program_units)
    }

    pub fn motion_control_mode(&self) -> MotionMode {
        self.motion_mode
    }

    pub fn motion_control_tolerance(&self) -> f64 {
        self.program_units.to_prog_len(self.motion_tolerance)
    }

    pub fn naivecam_tolerance(&self) -> f64 {
        self.program_units.to_prog_len(self.chain.tolerance())
    }

    pub fn length_unit_type(&self) -> LengthUnits {
        self.program_units
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn is_synchronized(&self) -> bool {
        self.synched
    }

    /// Absolute end point in internal units.
    pub fn end_point(&self) -> Pose {
        self.end_point
    }

    /// Moves the end point without emitting anything (run-from-line).
    pub fn update_end_point(&mut self, pose: &Pose) {
        self.end_point = to_internal(pose, self.program_units);
    }

    pub fn offsets(&self) -> &OffsetStack {
        &self.offsets
    }

    pub fn external_units(&self) -> &ExternalUnits {
        &self.units
    }

    pub fn pending_segments(&self) -> usize {
        self.chain.len()
    }

    pub fn queue(&self) -> &InterpList {
        &self.queue
    }

    /// Takes the oldest queued message.
    pub fn next_message(&mut self) -> Option<QueuedMessage> {
        self.queue.pop()
    }

    /// Hands every queued message to the caller, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.queue.drain()
    }
}
