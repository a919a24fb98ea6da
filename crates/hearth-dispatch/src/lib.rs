//! # Hearth Dispatch
//!
//! The dispatch skeleton for the Hearth platform bus: how listeners
//! subscribe, how a request is correlated to exactly one response, how a
//! destination resolves to a stateful context before a handler runs, and
//! how service routing and broadcasts behave when handlers fail.
//!
//! ## Layers
//!
//! - [`Executor`] — per-listener bounded worker pool with backpressure, or
//!   an inline executor.
//! - [`MessageProcessor`] / [`BusListener`] — the generic classify →
//!   executor → handle → respond skeleton every listener shares.
//! - [`DispatchTable`] — explicit message-type → handler registration for
//!   plain (context-free) services.
//! - [`ContextualDispatcher`] — resolves the destination address to a
//!   context object before the per-type handler runs.
//! - [`ServiceDispatcher`] — top-level router from destination addresses to
//!   registered [`PlatformService`]s.
//!
//! ## Flow
//!
//! ```text
//! ┌───────────┐    ┌─────────────┐    ┌────────────────────────┐
//! │ MessageBus│───▶│ BusListener │───▶│ MessageProcessor       │
//! │ (deliver) │    │ (executor)  │    │  DispatchTable /       │
//! └───────────┘    └─────────────┘    │  ContextualDispatcher  │
//!                                     └───────────┬────────────┘
//!                                   response/error▼ via RequestResponder
//! ```

pub mod contextual;
pub mod error;
pub mod executor;
pub mod listener;
pub mod service;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use contextual::{
    BroadcastEventHandler, ContextLoader, ContextualDispatcher, ContextualDispatcherBuilder,
    ContextualEventHandler, ContextualRequestHandler,
};
pub use error::RegistryError;
pub use executor::Executor;
pub use listener::{BusListener, MessageProcessor};
pub use service::{PlatformService, ServiceDispatcher, ServiceDispatcherBuilder};
pub use table::{
    DispatchTable, DispatchTableBuilder, EventHandler, RequestHandler, event_fn, request_fn,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        BusListener, ContextLoader, ContextualDispatcher, DispatchTable, Executor,
        MessageProcessor, PlatformService, RegistryError, ServiceDispatcher, event_fn,
        request_fn,
    };
}
