//! Core types and configuration for hark.
//!
//! This crate holds the platform-agnostic pieces shared by every hark
//! sub-crate: the persisted configuration and the application constants.

mod cancel;
mod config;

pub use cancel::CancelToken;
pub use config::{
    Config, ConfigManager, LoginCredentials, Pins, SignalBackend, UsageMode, WakeSource,
    WatsonCredentials, WatsonTtsConfig,
};

/// Application name
pub const APP_NAME: &str = "hark";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "HARK_LOG";

/// Environment variable overriding the configuration file path
pub const CONFIG_ENV: &str = "HARK_CONFIG";
