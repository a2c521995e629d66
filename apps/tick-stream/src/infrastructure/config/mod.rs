//! Configuration Module
//!
//! Configuration loading for the tick stream service.

mod settings;

pub use settings::{BroadcastSettings, ConfigError, ServerSettings, StreamConfig, StreamSettings};
