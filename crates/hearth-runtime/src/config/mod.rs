//! Configuration loading and schema.
//!
//! See [`ConfigLoader`] for source layering and [`HearthConfig`] for the
//! schema.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    ClientConfig, DispatchConfig, HearthConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
};
