//! Shared test fixtures for the client crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use hearth_core::bus::{BusResult, BusSubscriber, MessageBus, Subscription};
use hearth_core::{AddressMatcher, PlatformMessage};

type ListenerMap = HashMap<u64, (Vec<AddressMatcher>, Arc<dyn BusSubscriber>)>;

/// A bus that records sent messages and can replay a message through its
/// matching subscribers inline.
#[derive(Default)]
pub struct RecordingBus {
    sent: Mutex<Vec<PlatformMessage>>,
    listeners: Arc<Mutex<ListenerMap>>,
    next_id: AtomicU64,
}

impl RecordingBus {
    pub fn sent(&self) -> Vec<PlatformMessage> {
        self.sent.lock().clone()
    }

    /// Delivers `message` to every subscriber whose matchers accept its
    /// destination, inline on the calling task.
    pub async fn deliver_matching(&self, message: PlatformMessage) {
        let destination = message.destination_or_broadcast();
        let targets: Vec<Arc<dyn BusSubscriber>> = self
            .listeners
            .lock()
            .values()
            .filter(|(matchers, _)| matchers.iter().any(|m| m.matches(&destination)))
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in targets {
            subscriber.deliver(message.clone()).await;
        }
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn send(&self, message: PlatformMessage) -> BusResult<()> {
        self.sent.lock().push(message);
        Ok(())
    }

    fn add_listener(
        &self,
        matchers: Vec<AddressMatcher>,
        subscriber: Arc<dyn BusSubscriber>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, (matchers, subscriber));
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            listeners.lock().remove(&id);
        })
    }
}
