//! In-process bus.
//!
//! [`LocalBus`] fans every published message out to the subscriptions whose
//! matchers accept its destination. Delivery runs on a spawned task per
//! subscriber, so a slow subscriber delays its own deliveries only, never
//! the sender. This is the bus the single-process hub runs on, and the
//! transport tests run against.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{BusResult, BusSubscriber, MessageBus, Subscription};
use crate::matcher::AddressMatcher;
use crate::message::PlatformMessage;

struct Registration {
    matchers: Vec<AddressMatcher>,
    subscriber: Arc<dyn BusSubscriber>,
}

/// An in-process, matcher-filtered fan-out bus.
#[derive(Default)]
pub struct LocalBus {
    registrations: Arc<Mutex<HashMap<u64, Registration>>>,
    next_id: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registrations.lock().len()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn send(&self, message: PlatformMessage) -> BusResult<()> {
        let destination = message.destination_or_broadcast();
        let targets: Vec<Arc<dyn BusSubscriber>> = self
            .registrations
            .lock()
            .values()
            .filter(|r| r.matchers.iter().any(|m| m.matches(&destination)))
            .map(|r| Arc::clone(&r.subscriber))
            .collect();

        trace!(
            destination = %destination,
            msg_type = message.message_type(),
            subscribers = targets.len(),
            "delivering message"
        );

        for subscriber in targets {
            let message = message.clone();
            tokio::spawn(async move {
                subscriber.deliver(message).await;
            });
        }
        Ok(())
    }

    fn add_listener(
        &self,
        matchers: Vec<AddressMatcher>,
        subscriber: Arc<dyn BusSubscriber>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registrations.lock().insert(
            id,
            Registration {
                matchers,
                subscriber,
            },
        );

        let registrations = Arc::clone(&self.registrations);
        Subscription::new(move || {
            registrations.lock().remove(&id);
        })
    }
}
