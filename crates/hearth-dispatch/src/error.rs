//! Dispatch-layer error types.

use thiserror::Error;

use hearth_core::Address;

/// Configuration errors raised while building dispatch or service tables.
///
/// These fire at startup, never at message time: tables are immutable once
/// built, so an ambiguous registration is rejected before any traffic flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two request handlers registered for one message type.
    #[error("duplicate request handler for message type [{0}]")]
    DuplicateRequestHandler(String),

    /// Two event handlers registered for one event type.
    #[error("duplicate event handler for event type [{0}]")]
    DuplicateEventHandler(String),

    /// Two fallback request handlers registered.
    #[error("duplicate fallback request handler")]
    DuplicateFallback,

    /// Two services registered for one service address.
    #[error("duplicate service registration for address [{0}]")]
    DuplicateService(Address),

    /// A service bound to something other than a bare service address.
    #[error("service address [{0}] must be a namespace:group: address")]
    InvalidServiceAddress(Address),
}
