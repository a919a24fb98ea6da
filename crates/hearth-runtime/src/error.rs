//! Runtime error types.

use thiserror::Error;

/// Errors that can occur during runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Service or handler registration was rejected.
    #[error(transparent)]
    Registry(#[from] hearth_dispatch::RegistryError),

    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The runtime was started twice or used before `init()`.
    #[error("runtime lifecycle error: {0}")]
    Lifecycle(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
