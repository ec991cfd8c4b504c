// src/canon/mod.rs - canonical machining calls to trajectory messages
//
// The interpreter drives a `Canon` session one canonical call at a time.
// The session converts units, applies offsets, merges collinear feeds,
// linearizes shallow arcs, computes velocity/acceleration envelopes and
// queues the resulting messages on its `InterpList`.
use canon_shared::{KinematicsError, Pose};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod arc;
pub mod call;
pub mod coalesce;
pub mod emitter;
pub mod envelope;
pub mod message;
pub mod nurbs;
pub mod offsets;
pub mod units;

pub use arc::Plane;
pub use call::{load_program, parse_program, ArcCommand, CanonCall};
pub use emitter::Canon;
pub use envelope::AxisLimits;
pub use message::{InputType, InterpList, MotionType, QueuedMessage, TermCondition, ToolEntry, TrajMessage, WaitType};
pub use nurbs::ControlPoint;
pub use offsets::OffsetStack;
pub use units::{ExternalUnits, LengthUnits};

/// Highest digital or analog input index a wait may name, exclusive.
pub const MAX_AUX_INPUTS: i32 = 64;

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("{kind:?} input index {index} out of range")]
    InputIndex { kind: InputType, index: i32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),
}

/// Trajectory blending mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    ExactStop,
    ExactPath,
    #[default]
    Continuous,
}

/// Everything a session needs from the machine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonSettings {
    pub limits: AxisLimits,
    /// External length units per millimetre.
    pub linear_units: f64,
    /// External angle units per degree.
    pub angular_units: f64,
    /// Machine position for tool changes, external units.
    pub tool_change_position: Option<Pose>,
    /// Naive-CAM tolerance applied by `init_canon`, program units.
    pub naivecam_tolerance: f64,
    /// Plugin payloads longer than this are cut.
    pub max_plugin_call_len: usize,
}

impl Default for CanonSettings {
    fn default() -> Self {
        Self {
            limits: AxisLimits::default(),
            linear_units: 1.0,
            angular_units: 1.0,
            tool_change_position: None,
            naivecam_tolerance: 0.0,
            max_plugin_call_len: 1024,
        }
    }
}
