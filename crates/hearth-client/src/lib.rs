//! # Hearth Client
//!
//! Outbound correlated-request API for the Hearth platform bus.
//!
//! The bus itself is fire-and-forget; [`PlatformBusClient`] layers a
//! request/response contract on top of it for callers who need a
//! synchronous-feeling reply: every request owns a correlation id, a
//! pending-table entry and an independent deadline timer, and resolves to
//! exactly one of success, error response, timeout or cancellation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_client::PlatformBusClient;
//! use hearth_core::{Address, AddressMatcher, MessageBody, PlatformMessage};
//!
//! let client = PlatformBusClient::new(bus, vec![AddressMatcher::service("CLNT", "ui")]);
//!
//! let request = PlatformMessage::builder()
//!     .from(Address::service("CLNT", "ui"))
//!     .to(Address::platform_service("scheduler"))
//!     .request(true)
//!     .correlation_id("abc-123")
//!     .payload(MessageBody::builder("scheduler:AddTask").build())
//!     .build();
//!
//! let response = client.request(request).await.await?;
//! ```

pub mod client;
pub mod error;
pub mod future;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DEFAULT_TIMEOUT, PlatformBusClient};
pub use error::RequestError;
pub use future::ResponseFuture;
