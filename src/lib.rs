// src/lib.rs - canonical machining call translator
pub mod canon;
pub mod config;

pub use canon::{Canon, CanonCall, CanonError, CanonSettings, QueuedMessage, TrajMessage};
pub use config::{load_config, Config, ConfigError};
