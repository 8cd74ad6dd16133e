//! Error types for the resource runtime layer.

use thiserror::Error;

/// Errors that can occur while registering runtimes or building resources.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The script runtime handle is not known to this module.
    #[error("Script runtime not registered: {0}")]
    RuntimeNotRegistered(String),

    /// A runtime refused to build an implementation for a resource.
    #[error("Resource implementation failed: {0}")]
    ImplementationFailed(String),

    /// Configuration is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
