//! # Hearth Runtime
//!
//! Runtime orchestration for the Hearth platform: configuration loading,
//! logging setup, and the [`PlatformRuntime`] that wires services, the
//! service dispatcher and the bus into a process lifecycle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_runtime::PlatformRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PlatformRuntime::builder()
//!         .service(scheduler_service)
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, HearthConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{PlatformRuntime, RuntimeBuilder};
