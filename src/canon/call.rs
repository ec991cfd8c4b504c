// src/canon/call.rs - serialized canonical calls for replaying a program
use canon_shared::Pose;
use serde::Deserialize;

use super::arc::Plane;
use super::emitter::Canon;
use super::message::{InputType, ToolEntry, WaitType};
use super::nurbs::ControlPoint;
use super::units::LengthUnits;
use super::{CanonError, MotionMode};

/// Arguments of an arc feed, in program units. `first_*`/`second_*` name
/// the in-plane axes of the selected plane (X/Y, Y/Z or Z/X); the axial
/// end point is the third axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ArcCommand {
    pub first_end: f64,
    pub second_end: f64,
    pub first_axis: f64,
    pub second_axis: f64,
    /// Positive counter-clockwise, negative clockwise; magnitude above one
    /// adds full turns. Zero emits a linear move.
    pub rotation: i32,
    pub axis_end_point: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

/// One canonical call as it appears in a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CanonCall {
    InitCanon,
    Finish,
    UseLengthUnits { units: LengthUnits },
    SelectPlane { plane: Plane },
    SetNaivecamTolerance { tolerance: f64 },
    SetMotionControlMode {
        mode: MotionMode,
        #[serde(default)]
        tolerance: f64,
    },
    SetG5xOffset { index: i32, origin: Pose },
    SetG92Offset { origin: Pose },
    SetXyRotation { degrees: f64 },
    UseToolLengthOffset { offset: Pose },
    SetFeedRate { rate: f64 },
    SetFeedMode { feed_per_revolution: bool },
    StartSpeedFeedSynch {
        feed_per_revolution: f64,
        #[serde(default)]
        velocity_mode: bool,
    },
    StopSpeedFeedSynch,
    StraightTraverse { line: i32, target: Pose },
    StraightFeed { line: i32, target: Pose },
    StraightProbe {
        line: i32,
        target: Pose,
        #[serde(default)]
        probe_type: u8,
    },
    RigidTap { line: i32, x: f64, y: f64, z: f64 },
    ArcFeed { line: i32, arc: ArcCommand },
    NurbsFeed {
        line: i32,
        control_points: Vec<ControlPoint>,
        order: usize,
    },
    Dwell { seconds: f64 },
    UnlockRotary { line: i32, axis: usize },
    LockRotary { axis: usize },
    SetSpindleMode { css_maximum: f64 },
    SetSpindleSpeed { speed: f64 },
    StartSpindleClockwise,
    StartSpindleCounterclockwise,
    StopSpindleTurning,
    OrientSpindle { orientation: f64, mode: i32 },
    WaitSpindleOrientComplete { timeout: f64 },
    SetToolTableEntry { entry: ToolEntry },
    StartChange,
    ChangeTool { slot: i32 },
    SelectPocket { pocket: i32, tool: i32 },
    ChangeToolNumber { tool: i32 },
    SetFeedOverride { enabled: bool },
    SetSpindleOverride { enabled: bool },
    SetAdaptiveFeed { enabled: bool },
    SetFeedHold { enabled: bool },
    SetFlood { on: bool },
    SetMist { on: bool },
    SetMotionOutputBit { index: u32 },
    ClearMotionOutputBit { index: u32 },
    SetAuxOutputBit { index: u32 },
    ClearAuxOutputBit { index: u32 },
    SetMotionOutputValue { index: u32, value: f64 },
    SetAuxOutputValue { index: u32, value: f64 },
    Wait {
        index: i32,
        input_type: InputType,
        wait_type: WaitType,
        #[serde(default)]
        timeout: f64,
    },
    ProgramStop,
    OptionalProgramStop,
    ProgramEnd,
    SetOptionalProgramStop { enabled: bool },
    SetBlockDelete { enabled: bool },
    TurnProbeOn,
    TurnProbeOff,
    Message { text: String },
    CanonError { text: String },
    Comment { text: String },
    Log { text: String },
    LogOpen { path: String },
    LogAppend { path: String },
    LogClose,
    PluginCall { payload: String },
    IoPluginCall { payload: String },
    ExternalPosition { position: Pose },
    ExternalProbePosition { position: Pose },
    UpdateEndPoint { position: Pose },
}

impl Canon {
    /// Dispatches one replayed call to the matching session method.
    pub fn execute(&mut self, call: CanonCall) -> Result<(), CanonError> {
        match call {
            CanonCall::InitCanon => self.init_canon(),
            CanonCall::Finish => self.finish(),
            CanonCall::UseLengthUnits { units } => self.use_length_units(units),
            CanonCall::SelectPlane { plane } => self.select_plane(plane),
            CanonCall::SetNaivecamTolerance { tolerance } => self.set_naivecam_tolerance(tolerance),
            CanonCall::SetMotionControlMode { mode, tolerance } => self.set_motion_control_mode(mode, tolerance),
            CanonCall::SetG5xOffset { index, origin } => self.set_g5x_offset(index, &origin),
            CanonCall::SetG92Offset { origin } => self.set_g92_offset(&origin),
            CanonCall::SetXyRotation { degrees } => self.set_xy_rotation(degrees),
            CanonCall::UseToolLengthOffset { offset } => self.use_tool_length_offset(&offset),
            CanonCall::SetFeedRate { rate } => self.set_feed_rate(rate),
            CanonCall::SetFeedMode { feed_per_revolution } => self.set_feed_mode(feed_per_revolution),
            CanonCall::StartSpeedFeedSynch {
                feed_per_revolution,
                velocity_mode,
            } => self.start_speed_feed_synch(feed_per_revolution, velocity_mode),
            CanonCall::StopSpeedFeedSynch => self.stop_speed_feed_synch(),
            CanonCall::StraightTraverse { line, target } => self.straight_traverse(line, &target),
            CanonCall::StraightFeed { line, target } => self.straight_feed(line, &target),
            CanonCall::StraightProbe { line, target, probe_type } => self.straight_probe(line, &target, probe_type),
            CanonCall::RigidTap { line, x, y, z } => self.rigid_tap(line, x, y, z),
            CanonCall::ArcFeed { line, arc } => self.arc_feed(line, &arc),
            CanonCall::NurbsFeed {
                line,
                control_points,
                order,
            } => self.nurbs_feed(line, &control_points, order),
            CanonCall::Dwell { seconds } => self.dwell(seconds),
            CanonCall::UnlockRotary { line, axis } => self.unlock_rotary(line, axis),
            CanonCall::LockRotary { axis } => self.lock_rotary(axis),
            CanonCall::SetSpindleMode { css_maximum } => self.set_spindle_mode(css_maximum),
            CanonCall::SetSpindleSpeed { speed } => self.set_spindle_speed(speed),
            CanonCall::StartSpindleClockwise => self.start_spindle_clockwise(),
            CanonCall::StartSpindleCounterclockwise => self.start_spindle_counterclockwise(),
            CanonCall::StopSpindleTurning => self.stop_spindle_turning(),
            CanonCall::OrientSpindle { orientation, mode } => self.orient_spindle(orientation, mode),
            CanonCall::WaitSpindleOrientComplete { timeout } => self.wait_spindle_orient_complete(timeout),
            CanonCall::SetToolTableEntry { entry } => self.set_tool_table_entry(entry),
            CanonCall::StartChange => self.start_change(),
            CanonCall::ChangeTool { slot } => self.change_tool(slot),
            CanonCall::SelectPocket { pocket, tool } => self.select_pocket(pocket, tool),
            CanonCall::ChangeToolNumber { tool } => self.change_tool_number(tool),
            CanonCall::SetFeedOverride { enabled } => self.set_feed_override(enabled),
            CanonCall::SetSpindleOverride { enabled } => self.set_spindle_override(enabled),
            CanonCall::SetAdaptiveFeed { enabled } => self.set_adaptive_feed(enabled),
            CanonCall::SetFeedHold { enabled } => self.set_feed_hold(enabled),
            CanonCall::SetFlood { on } => self.set_flood(on),
            CanonCall::SetMist { on } => self.set_mist(on),
            CanonCall::SetMotionOutputBit { index } => self.set_motion_output_bit(index),
            CanonCall::ClearMotionOutputBit { index } => self.clear_motion_output_bit(index),
            CanonCall::SetAuxOutputBit { index } => self.set_aux_output_bit(index),
            CanonCall::ClearAuxOutputBit { index } => self.clear_aux_output_bit(index),
            CanonCall::SetMotionOutputValue { index, value } => self.set_motion_output_value(index, value),
            CanonCall::SetAuxOutputValue { index, value } => self.set_aux_output_value(index, value),
            CanonCall::Wait {
                index,
                input_type,
                wait_type,
                timeout,
            } => self.wait(index, input_type, wait_type, timeout)?,
            CanonCall::ProgramStop => self.program_stop(),
            CanonCall::OptionalProgramStop => self.optional_program_stop(),
            CanonCall::ProgramEnd => self.program_end(),
            CanonCall::SetOptionalProgramStop { enabled } => self.set_optional_program_stop(enabled),
            CanonCall::SetBlockDelete { enabled } => self.set_block_delete(enabled),
            CanonCall::TurnProbeOn => self.turn_probe_on(),
            CanonCall::TurnProbeOff => self.turn_probe_off(),
            CanonCall::Message { text } => self.message(&text),
            CanonCall::CanonError { text } => self.canon_error(&text),
            CanonCall::Comment { text } => self.comment(&text),
            CanonCall::Log { text } => self.log(&text)?,
            CanonCall::LogOpen { path } => self.log_open(&path)?,
            CanonCall::LogAppend { path } => self.log_append(&path)?,
            CanonCall::LogClose => self.log_close(),
            CanonCall::PluginCall { payload } => self.plugin_call(payload.as_bytes()),
            CanonCall::IoPluginCall { payload } => self.io_plugin_call(payload.as_bytes()),
            CanonCall::ExternalPosition { position } => {
                let program = self.external_position(&position);
                tracing::debug!("machine position adopted, program coordinates {:?}", program);
            }
            CanonCall::ExternalProbePosition { position } => {
                let program = self.external_probe_position(&position);
                tracing::debug!("probe tripped at {:?}", program);
            }
            CanonCall::UpdateEndPoint { position } => self.update_end_point(&position),
        }
        Ok(())
    }
}

/// Parses a JSON array of calls.
pub fn parse_program(json: &str) -> Result<Vec<CanonCall>, CanonError> {
    Ok(serde_json::from_str(json)?)
}

/// Loads a replay script from a JSON file.
pub fn load_program(path: &str) -> Result<Vec<CanonCall>, CanonError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match parse_program(&contents) {
            Ok(calls) => Ok(calls),
            Err(e) => {
                tracing::error!("Failed to parse program '{}': {}", path, e);
                Err(e)
            }
        },
        Err(e) => {
            tracing::error!("Failed to read program file '{}': {}", path, e);
            Err(CanonError::Io(e))
        }
    }
}
