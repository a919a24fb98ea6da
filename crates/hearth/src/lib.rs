//! # Hearth
//!
//! Message-dispatch core for a distributed home-automation platform: a hub
//! and a set of backend services exchanging addressed, typed messages over
//! a shared bus, with request/response correlation layered on plain
//! publish/subscribe.
//!
//! This crate re-exports the full public API:
//!
//! - [`hearth_core`] — addresses, matchers, messages, the bus seam and the
//!   request/response helper.
//! - [`hearth_dispatch`] — listener skeleton, dispatch tables, contextual
//!   dispatch and service routing.
//! - [`hearth_client`] — the correlated-request client.
//! - [`hearth_runtime`] — configuration, logging and process lifecycle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PlatformRuntime::builder()
//!         .service(scheduler_service)
//!         .build()?;
//!
//!     let client = runtime.client(vec![AddressMatcher::service("CLNT", "ui")]);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub use hearth_client;
pub use hearth_core;
pub use hearth_dispatch;
pub use hearth_runtime;

pub use hearth_client::{PlatformBusClient, RequestError, ResponseFuture};
pub use hearth_core::{
    Address, AddressMatcher, BusError, BusSubscriber, DestinationKind, DispatchError, ErrorBody,
    LocalBus, MessageBody, MessageBus, MessageKind, PlatformMessage, RequestResponder, SharedBus,
    Subscription,
};
pub use hearth_dispatch::{
    BusListener, ContextLoader, ContextualDispatcher, DispatchTable, Executor, MessageProcessor,
    PlatformService, RegistryError, ServiceDispatcher,
};
pub use hearth_runtime::{HearthConfig, PlatformRuntime, RuntimeError};

/// Prelude for common imports.
pub mod prelude {
    pub use hearth_client::{PlatformBusClient, RequestError};
    pub use hearth_core::prelude::*;
    pub use hearth_dispatch::prelude::*;
    pub use hearth_runtime::{HearthConfig, PlatformRuntime};
}
