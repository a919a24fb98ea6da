//! Shared test fixtures for the dispatch crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use hearth_core::bus::{BusResult, BusSubscriber, MessageBus, Subscription};
use hearth_core::{Address, AddressMatcher, MessageBody, PlatformMessage};

type ListenerMap = HashMap<u64, (Vec<AddressMatcher>, Arc<dyn BusSubscriber>)>;

/// A bus that records every sent message and registered listener, and can
/// replay a message through its matching subscribers.
#[derive(Default)]
pub struct RecordingBus {
    sent: Mutex<Vec<PlatformMessage>>,
    listeners: Arc<Mutex<ListenerMap>>,
    next_id: AtomicU64,
    registered: AtomicUsize,
}

impl RecordingBus {
    pub fn sent(&self) -> Vec<PlatformMessage> {
        self.sent.lock().clone()
    }

    /// Listeners registered over the bus's lifetime.
    pub fn listener_count(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    /// Listeners currently subscribed.
    pub fn active_listener_count(&self) -> usize {
        self.listeners.lock().len()
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
        self.registered.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, (matchers, subscriber));
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            listeners.lock().remove(&id);
        })
    }
}

/// Builds a request of `msg_type` addressed to the `namespace:group:`
/// service, from `CLNT:ui:` with correlation id `corr-1`.
pub fn request_to(msg_type: &str, namespace: &str, group: &str) -> PlatformMessage {
    PlatformMessage::builder()
        .from(Address::service("CLNT", "ui"))
        .to(Address::service(namespace, group))
        .request(true)
        .correlation_id("corr-1")
        .payload(MessageBody::builder(msg_type).build())
        .build()
}
