//! # Hearth Core
//!
//! Message model and bus core for the Hearth home-automation platform.
//!
//! A hub and a set of backend services exchange addressed, typed messages
//! over a shared bus, with a request/response convention layered on plain
//! publish/subscribe. This crate holds the pieces everything else builds on:
//!
//! - **Addressing**: [`Address`] endpoint identity and [`AddressMatcher`]
//!   subscription patterns.
//! - **Messages**: the [`PlatformMessage`] envelope, [`MessageBody`]
//!   payloads and the uniform [`ErrorBody`] error payload.
//! - **Bus seam**: the [`MessageBus`] / [`BusSubscriber`] traits behind
//!   which the real broker lives, the in-process [`LocalBus`], and
//!   [`RequestResponder`] for request/response semantics.
//!
//! The dispatch skeleton (listeners, contextual dispatch, service routing)
//! lives in `hearth-dispatch`; the correlated-request client in
//! `hearth-client`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_core::{Address, LocalBus, MessageBody, PlatformMessage, RequestResponder};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(LocalBus::new());
//! let responder = RequestResponder::new(bus.clone());
//!
//! let request = PlatformMessage::request(
//!     MessageBody::builder("scheduler:AddTask").build(),
//!     Address::service("CLNT", "ui"),
//!     Address::platform_service("scheduler"),
//! );
//!
//! responder
//!     .invoke_and_send_response(&request, async {
//!         Ok(MessageBody::builder("scheduler:AddTaskResponse").build())
//!     })
//!     .await;
//! ```

pub mod address;
pub mod body;
pub mod bus;
pub mod error;
pub mod errors;
pub mod matcher;
pub mod message;

pub use address::{
    Address, DestinationKind, HUB_SERVICE_GROUP, NAMESPACE_CLIENT, NAMESPACE_DRIVER,
    NAMESPACE_HUB, NAMESPACE_SERVICE,
};
pub use body::{MessageBody, MessageBodyBuilder};
pub use bus::{
    BusResult, BusSubscriber, LocalBus, MessageBus, RequestResponder, SharedBus, Subscription,
};
pub use error::{AddressParseError, BusError, DispatchError, MatcherParseError};
pub use errors::ErrorBody;
pub use matcher::AddressMatcher;
pub use message::{MessageBuilder, MessageKind, PlatformMessage};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Address, AddressMatcher, BusSubscriber, DestinationKind, DispatchError, ErrorBody,
        LocalBus, MessageBody, MessageBus, MessageKind, PlatformMessage, RequestResponder,
        SharedBus, Subscription,
    };
}
