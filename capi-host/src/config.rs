//! Configuration file loading and management
//!
//! This module handles loading and parsing the host configuration from
//! `$XDG_CONFIG_HOME/capi-host/config.toml`. If the configuration file doesn't
//! exist, a default configuration is created with documented comments.

use anyhow::{Context, Result};
use resource_runtime::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Host-specific configuration
    #[serde(default)]
    pub host: HostSection,
    /// Modules loaded by `run` and `inspect` when no path is given
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

/// Host settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// SDK version modules are compared against
    /// Default: the version this host was built with
    #[serde(default = "default_sdk_version")]
    pub sdk_version: u32,
    /// Reject modules that declare no SDK version and no skip marker
    /// Default: true
    #[serde(default = "default_enforce_version")]
    pub enforce_version: bool,
    /// Interval between ticks in milliseconds
    /// Default: 50
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// A module to load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleEntry {
    /// Path to the module's shared library
    pub path: PathBuf,
    /// Runtime configuration file handed to the module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

fn default_sdk_version() -> u32 {
    capi_extra::alt_GetSDKVersion()
}

fn default_enforce_version() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            sdk_version: default_sdk_version(),
            enforce_version: default_enforce_version(),
            tick_interval_ms: default_tick_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl HostSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/capi-host/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "raibid-labs", "capi-host")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Create a default configuration file with documented comments
    pub fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    fn default_config_content() -> String {
        format!(
            r#"# capi-host Configuration
# This file configures how modules are loaded and driven.

[host]
# SDK version modules must report through GetSDKVersion
# Default: {sdk_version}
sdk_version = {sdk_version}

# Reject modules exporting neither GetSDKVersion nor SkipSDKVersionCheck
# Default: true
enforce_version = true

# Interval between ticks in milliseconds
# Default: 50
tick_interval_ms = 50

# Log level: trace, debug, info, warn, error
# Default: "info"
log_level = "info"

# Modules used when no path is given on the command line.
# Each module can be configured with:
# - path: Path to the shared library
# - config: Runtime config file passed to the module (optional)

# [[modules]]
# path = "target/debug/libmodule_dummy.so"
# config = "module-dummy.toml"
"#,
            sdk_version = default_sdk_version()
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if LogLevel::parse(&self.host.log_level).is_none() {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: trace, debug, info, warn, error",
                self.host.log_level
            );
        }

        if self.host.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be greater than 0");
        }

        for module in &self.modules {
            if module.path.as_os_str().is_empty() {
                anyhow::bail!("Module path cannot be empty");
            }
        }

        Ok(())
    }
}
