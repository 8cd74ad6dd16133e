//! Module configuration.
//!
//! A module reads an optional TOML file named by the `RESOURCE_RUNTIME_CONFIG`
//! environment variable when the host loads it. Every key has a default, so a
//! missing variable simply yields [`RuntimeConfig::default`].
//!
//! ```toml
//! [runtime]
//! resource_type = "rust"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::{LogLevel, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main module configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Script runtime settings
    #[serde(default)]
    pub runtime: RuntimeSection,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Script runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSection {
    /// Resource type the runtime registers for
    /// Default: "rust"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
}

fn default_resource_type() -> String {
    "rust".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            resource_type: default_resource_type(),
        }
    }
}

impl RuntimeConfig {
    /// Environment variable holding the path of the configuration file.
    pub const ENV_VAR: &'static str = "RESOURCE_RUNTIME_CONFIG";

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by [`RuntimeConfig::ENV_VAR`], or defaults if unset.
    pub fn from_env() -> RuntimeResult<Self> {
        match std::env::var_os(Self::ENV_VAR) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.runtime.resource_type.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "resource_type cannot be empty".to_string(),
            ));
        }

        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(RuntimeError::InvalidConfig(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
