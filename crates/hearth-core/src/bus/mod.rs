//! The platform bus interface.
//!
//! The real broker transport lives outside this crate; dispatch code talks
//! to it through [`MessageBus`]: publish a message, or subscribe with a set
//! of [`AddressMatcher`]s and get deliveries through a [`BusSubscriber`].
//! [`LocalBus`] is the in-process implementation used by the hub process and
//! by tests.
//!
//! [`RequestResponder`] layers the request/response convention on top of a
//! bus: run a handler under the request's diagnostic context, turn its
//! failure into a structured error body, and send back at most one response.

mod local;
mod respond;

pub use local::LocalBus;
pub use respond::RequestResponder;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::BusError;
use crate::matcher::AddressMatcher;
use crate::message::PlatformMessage;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Receives messages delivered by the bus.
///
/// The bus may invoke `deliver` concurrently from several delivery tasks;
/// implementations must not assume serial delivery. Implementations should
/// hand real work to their own executor and return promptly — see the
/// dispatch layer.
#[async_trait]
pub trait BusSubscriber: Send + Sync {
    async fn deliver(&self, message: PlatformMessage);
}

/// The transport seam: publish and subscribe-by-pattern.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a message. Transport failures surface here as [`BusError`];
    /// the core never retries.
    async fn send(&self, message: PlatformMessage) -> BusResult<()>;

    /// Subscribes `subscriber` to every message whose destination is
    /// accepted by at least one of `matchers`.
    fn add_listener(
        &self,
        matchers: Vec<AddressMatcher>,
        subscriber: Arc<dyn BusSubscriber>,
    ) -> Subscription;
}

/// A bus reference shared across dispatch components.
pub type SharedBus = Arc<dyn MessageBus>;

/// Handle to an active bus subscription.
///
/// Calling [`Subscription::remove`] detaches the subscriber; calling it
/// again is a no-op. Dropping the handle does *not* remove the
/// subscription — removal is always explicit.
pub struct Subscription {
    removed: AtomicBool,
    remove: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    /// Builds a subscription around its removal action.
    pub fn new(remove: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            removed: AtomicBool::new(false),
            remove: Box::new(remove),
        }
    }

    /// Detaches the subscriber. Idempotent.
    pub fn remove(&self) {
        if !self.removed.swap(true, Ordering::AcqRel) {
            (self.remove)();
        }
    }

    /// Whether `remove` has been called.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("removed", &self.is_removed())
            .finish()
    }
}
