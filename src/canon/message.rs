// src/canon/message.rs - trajectory/task messages and the interpreter list
use std::collections::VecDeque;

use canon_shared::{Cartesian, Pose};
use serde::{Deserialize, Serialize};

/// Longest operator text carried by a message, in bytes.
pub const MAX_TEXT_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    Traverse,
    Feed,
    Arc,
    ToolChange,
    IndexRotary,
}

/// How the planner ends a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCondition {
    Stop,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Digital,
    Analog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitType {
    Immediate,
    Rise,
    Fall,
    High,
    Low,
}

/// Geometry of one tool table entry, in external units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolEntry {
    pub pocket: i32,
    pub toolno: i32,
    pub offset: Pose,
    pub diameter: f64,
    pub frontangle: f64,
    pub backangle: f64,
    pub orientation: i32,
}

/// One message for the trajectory planner or the task layer. Positions
/// and rates are in external units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrajMessage {
    LinearMove {
        end: Pose,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        motion_type: MotionType,
        feed_per_revolution: bool,
        index_rotary: Option<usize>,
    },
    CircularMove {
        end: Pose,
        center: Cartesian,
        normal: Cartesian,
        turn: i32,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        motion_type: MotionType,
        feed_per_revolution: bool,
    },
    RigidTap {
        pos: Cartesian,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
    },
    Probe {
        pos: Pose,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        probe_type: u8,
    },
    SetTermCond {
        cond: TermCondition,
        tolerance: f64,
    },
    SpindleSync {
        feed_per_revolution: f64,
        velocity_mode: bool,
    },
    SetG5x {
        index: i32,
        origin: Pose,
    },
    SetG92 {
        origin: Pose,
    },
    SetRotation {
        rotation: f64,
    },
    SetToolOffset {
        offset: Pose,
    },
    Delay {
        seconds: f64,
    },
    SpindleOn {
        speed: f64,
        factor: f64,
        xoffset: f64,
    },
    SpindleSpeed {
        speed: f64,
        factor: f64,
        xoffset: f64,
    },
    SpindleOff,
    SpindleOrient {
        orientation: f64,
        mode: i32,
    },
    SpindleWaitOrient {
        timeout: f64,
    },
    ToolSetOffset {
        entry: ToolEntry,
    },
    ToolStartChange,
    ToolLoad,
    ToolPrepare {
        pocket: i32,
        tool: i32,
    },
    ToolSetNumber {
        tool: i32,
    },
    FeedOverrideEnable {
        enabled: bool,
    },
    AdaptiveFeed {
        enabled: bool,
    },
    SpindleOverrideEnable {
        enabled: bool,
    },
    FeedHoldEnable {
        enabled: bool,
    },
    CoolantFlood {
        on: bool,
    },
    CoolantMist {
        on: bool,
    },
    OperatorDisplay {
        text: String,
    },
    OperatorError {
        text: String,
    },
    ClearProbeTripped,
    PlanPause,
    PlanOptionalStop,
    PlanEnd,
    SetDigitalOutput {
        index: u32,
        start: bool,
        end: bool,
        now: bool,
    },
    SetAnalogOutput {
        index: u32,
        start: f64,
        end: f64,
        now: bool,
    },
    AuxInputWait {
        index: u32,
        input_type: InputType,
        wait_type: WaitType,
        timeout: f64,
    },
    PluginCall {
        call: Vec<u8>,
        len: usize,
    },
    IoPluginCall {
        call: Vec<u8>,
        len: usize,
    },
}

impl TrajMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            TrajMessage::LinearMove { .. } => "linear_move",
            TrajMessage::CircularMove { .. } => "circular_move",
            TrajMessage::RigidTap { .. } => "rigid_tap",
            TrajMessage::Probe { .. } => "probe",
            TrajMessage::SetTermCond { .. } => "set_term_cond",
            TrajMessage::SpindleSync { .. } => "spindle_sync",
            TrajMessage::SetG5x { .. } => "set_g5x",
            TrajMessage::SetG92 { .. } => "set_g92",
            TrajMessage::SetRotation { .. } => "set_rotation",
            TrajMessage::SetToolOffset { .. } => "set_tool_offset",
            TrajMessage::Delay { .. } => "delay",
            TrajMessage::SpindleOn { .. } => "spindle_on",
            TrajMessage::SpindleSpeed { .. } => "spindle_speed",
            TrajMessage::SpindleOff => "spindle_off",
            TrajMessage::SpindleOrient { .. } => "spindle_orient",
            TrajMessage::SpindleWaitOrient { .. } => "spindle_wait_orient",
            TrajMessage::ToolSetOffset { .. } => "tool_set_offset",
            TrajMessage::ToolStartChange => "tool_start_change",
            TrajMessage::ToolLoad => "tool_load",
            TrajMessage::ToolPrepare { .. } => "tool_prepare",
            TrajMessage::ToolSetNumber { .. } => "tool_set_number",
            TrajMessage::FeedOverrideEnable { .. } => "feed_override_enable",
            TrajMessage::AdaptiveFeed { .. } => "adaptive_feed",
            TrajMessage::SpindleOverrideEnable { .. } => "spindle_override_enable",
            TrajMessage::FeedHoldEnable { .. } => "feed_hold_enable",
            TrajMessage::CoolantFlood { .. } => "coolant_flood",
            TrajMessage::CoolantMist { .. } => "coolant_mist",
            TrajMessage::OperatorDisplay { .. } => "operator_display",
            TrajMessage::OperatorError { .. } => "operator_error",
            TrajMessage::ClearProbeTripped => "clear_probe_tripped",
            TrajMessage::PlanPause => "plan_pause",
            TrajMessage::PlanOptionalStop => "plan_optional_stop",
            TrajMessage::PlanEnd => "plan_end",
            TrajMessage::SetDigitalOutput { .. } => "set_digital_output",
            TrajMessage::SetAnalogOutput { .. } => "set_analog_output",
            TrajMessage::AuxInputWait { .. } => "aux_input_wait",
            TrajMessage::PluginCall { .. } => "plugin_call",
            TrajMessage::IoPluginCall { .. } => "io_plugin_call",
        }
    }

    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            TrajMessage::LinearMove { .. }
                | TrajMessage::CircularMove { .. }
                | TrajMessage::RigidTap { .. }
                | TrajMessage::Probe { .. }
        )
    }
}

/// Cuts `text` to at most `max` bytes without splitting a character.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// A queued message tagged with the source line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedMessage {
    pub line_number: i32,
    pub message: TrajMessage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStats {
    pub length: usize,
    pub max_length: usize,
    pub last_command: Option<String>,
}

/// Outbound FIFO between the translator and its consumer.
///
/// Every appended message is stamped with the line number most recently
/// set, so moves flushed late still carry the line that produced them.
#[derive(Debug, Default)]
pub struct InterpList {
    entries: VecDeque<QueuedMessage>,
    line_number: i32,
    max_length: usize,
    last_command: Option<&'static str>,
}

impl InterpList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_line_number(&mut self, line: i32) {
        self.line_number = line;
    }

    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    pub fn append(&mut self, message: TrajMessage) {
        tracing::debug!("line {}: queue {}", self.line_number, message.kind());
        self.entries.push_back(QueuedMessage {
            line_number: self.line_number,
            message,
        });
        self.max_length = self.max_length.max(self.entries.len());
        self.last_command = self.entries.back().map(|e| e.message.kind());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }

    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.entries.pop_front()
    }

    /// Removes and returns everything queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.entries.drain(..).collect()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            length: self.entries.len(),
            max_length: self.max_length,
            last_command: self.last_command.map(str::to_string),
        }
    }
}
