//! # Machine Configuration
//!
//! Axis limits, unit scales and kinematics for a translation session.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [traj]
//! linear_units = 1.0        # external units per mm
//! angular_units = 1.0       # external units per degree
//! tool_change_position = [0.0, 0.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
//!
//! [axes.x]
//! max_velocity = 200.0
//! max_acceleration = 1500.0
//!
//! [axes.a]
//! max_velocity = 360.0
//! max_acceleration = 3600.0
//!
//! [canon]
//! naivecam_tolerance = 0.01
//!
//! [kinematics]
//! kind = "rotary_table"
//! z_shift = 40.0
//! ```
//!
//! - Axes left out of `[axes]` are absent from the machine unless
//!   `traj.axis_mask` says otherwise.
//! - Limits are in external units per second (per second squared).

// src/config.rs - Single configuration file
use canon_shared::{axis_index, KinematicsConfig, Pose, AXIS_NAMES, NUM_AXES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::canon::{AxisLimits, CanonSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unknown axis '{0}'")]
    UnknownAxis(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the trajectory layer, axes, translator and kinematics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub traj: TrajConfig,
    #[serde(default = "default_axes")]
    pub axes: HashMap<String, AxisConfig>,
    #[serde(default)]
    pub canon: CanonConfig,
    #[serde(default)]
    pub kinematics: KinematicsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traj: TrajConfig::default(),
            axes: default_axes(),
            canon: CanonConfig::default(),
            kinematics: KinematicsConfig::default(),
        }
    }
}

/// Trajectory-level settings shared by every axis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrajConfig {
    #[serde(default = "default_linear_units")]
    pub linear_units: f64,
    #[serde(default = "default_angular_units")]
    pub angular_units: f64,
    #[serde(default)]
    pub axis_mask: Option<u32>,
    #[serde(default)]
    pub tool_change_position: Option<[f64; NUM_AXES]>,
}

impl Default for TrajConfig {
    fn default() -> Self {
        Self {
            linear_units: default_linear_units(),
            angular_units: default_angular_units(),
            axis_mask: None,
            tool_change_position: None,
        }
    }
}

/// Per-axis limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AxisConfig {
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            max_acceleration: default_max_acceleration(),
        }
    }
}

/// Translator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanonConfig {
    #[serde(default)]
    pub naivecam_tolerance: f64,
    #[serde(default = "default_max_plugin_call_len")]
    pub max_plugin_call_len: usize,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            naivecam_tolerance: 0.0,
            max_plugin_call_len: default_max_plugin_call_len(),
        }
    }
}

impl Config {
    /// Validate limits, unit scales and axis names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traj.linear_units < 0.0 || self.traj.angular_units < 0.0 {
            return Err(ConfigError::Invalid("unit scales must not be negative".to_string()));
        }
        if let Some(mask) = self.traj.axis_mask {
            if mask >= 1 << NUM_AXES {
                return Err(ConfigError::Invalid(format!("axis_mask {:#x} names axes beyond W", mask)));
            }
            // An enabled axis with no limits would zero every move touching it.
            for (index, name) in AXIS_NAMES.iter().enumerate() {
                if mask & (1 << index) != 0 && !self.axes.keys().any(|key| axis_index(key) == Some(index)) {
                    return Err(ConfigError::Invalid(format!(
                        "axis_mask enables axis '{}' but [axes.{}] is missing",
                        name, name
                    )));
                }
            }
        }
        for (name, axis) in &self.axes {
            if axis_index(name).is_none() {
                return Err(ConfigError::UnknownAxis(name.clone()));
            }
            if axis.max_velocity <= 0.0 {
                return Err(ConfigError::Invalid(format!("max_velocity for axis '{}' must be > 0", name)));
            }
            if axis.max_acceleration <= 0.0 {
                return Err(ConfigError::Invalid(format!("max_acceleration for axis '{}' must be > 0", name)));
            }
        }
        if self.canon.naivecam_tolerance < 0.0 {
            return Err(ConfigError::Invalid("naivecam_tolerance must be >= 0".to_string()));
        }
        if self.canon.max_plugin_call_len == 0 {
            return Err(ConfigError::Invalid("max_plugin_call_len must be > 0".to_string()));
        }
        Ok(())
    }

    /// Axis limit table; the mask defaults to the configured axes.
    pub fn axis_limits(&self) -> Result<AxisLimits, ConfigError> {
        let mut limits = AxisLimits {
            max_velocity: [0.0; NUM_AXES],
            max_acceleration: [0.0; NUM_AXES],
            axis_mask: 0,
        };
        for (name, axis) in &self.axes {
            let index = axis_index(name).ok_or_else(|| ConfigError::UnknownAxis(name.clone()))?;
            limits.max_velocity[index] = axis.max_velocity;
            limits.max_acceleration[index] = axis.max_acceleration;
            limits.axis_mask |= 1 << index;
        }
        if let Some(mask) = self.traj.axis_mask {
            limits.axis_mask = mask;
        }
        Ok(limits)
    }

    /// Read-only settings for a translation session.
    pub fn canon_settings(&self) -> Result<CanonSettings, ConfigError> {
        self.validate()?;
        Ok(CanonSettings {
            limits: self.axis_limits()?,
            linear_units: self.traj.linear_units,
            angular_units: self.traj.angular_units,
            tool_change_position: self.traj.tool_change_position.map(Pose::from_array),
            naivecam_tolerance: self.canon.naivecam_tolerance,
            max_plugin_call_len: self.canon.max_plugin_call_len,
        })
    }
}

// Default value functions
fn default_axes() -> HashMap<String, AxisConfig> {
    ["x", "y", "z"]
        .into_iter()
        .map(|name| (name.to_string(), AxisConfig::default()))
        .collect()
}
fn default_linear_units() -> f64 { 1.0 }
fn default_angular_units() -> f64 { 1.0 }
fn default_max_velocity() -> f64 { 100.0 }
fn default_max_acceleration() -> f64 { 1000.0 }
fn default_max_plugin_call_len() -> usize { 1024 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
