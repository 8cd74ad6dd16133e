//! Logging setup for modules.
//!
//! Modules log through `tracing`. The subscriber is installed once per
//! process; later calls leave the existing one in place.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging section of the runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    LogLevel::Info.as_str().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Log level names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by the configured
/// level when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let level = LogLevel::parse(&config.level).unwrap_or(LogLevel::Info);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
