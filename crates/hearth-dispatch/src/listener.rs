//! The listener skeleton.
//!
//! [`BusListener`] is the generic per-listener dispatch loop: every message
//! the bus delivers is handed to the listener's [`Executor`], classified as
//! request / error event / plain event, and routed to the owning
//! [`MessageProcessor`]. The delivery task itself does nothing but submit.
//!
//! # Failure semantics
//!
//! - **Requests** go through [`RequestResponder`], so a failing handler
//!   produces an error response — requests are never silently dropped.
//! - **Events and error events** that fail are logged and dropped; nothing
//!   escapes to the delivery path.
//!
//! # Lifecycle
//!
//! `init()` → `start()` → `stop()`, always in that order. `start` begins
//! consuming (registers the listener's matchers with the bus); `stop`
//! unlistens first, then runs the processor's teardown hook, then shuts the
//! executor down. Each hook defaults to a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use hearth_core::bus::{BusSubscriber, RequestResponder, SharedBus, Subscription};
use hearth_core::{AddressMatcher, DispatchError, MessageBody, MessageKind, PlatformMessage};

use crate::executor::Executor;

/// The work a listener routes messages to.
///
/// `handle_request` is the only required method; event handling, error-event
/// handling and the lifecycle hooks default to log-only / no-op behavior.
#[async_trait]
pub trait MessageProcessor: Send + Sync + 'static {
    /// Handles a request and produces the response body. Return the
    /// [`MessageBody::no_response`] sentinel to suppress the response.
    async fn handle_request(
        &self,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError>;

    /// Handles a plain event. Failures are logged and the event dropped.
    async fn handle_event(&self, message: &PlatformMessage) -> Result<(), DispatchError> {
        debug!(msg_type = message.message_type(), "ignoring event");
        Ok(())
    }

    /// Handles an error event. The default only logs it.
    async fn handle_error_event(&self, message: &PlatformMessage) {
        debug!(
            msg_type = message.message_type(),
            from = %message.source(),
            "ignoring error event"
        );
    }

    /// Post-construction hook.
    async fn on_init(&self) {}

    /// Warm-up hook, run before the listener begins consuming.
    async fn on_start(&self) {}

    /// Teardown hook, run after the listener has unlistened.
    async fn on_stop(&self) {}
}

/// Classify → handle → respond, for one message.
async fn dispatch(
    processor: Arc<dyn MessageProcessor>,
    responder: RequestResponder,
    message: PlatformMessage,
) {
    match message.kind() {
        MessageKind::Error => {
            processor.handle_error_event(&message).await;
        }
        MessageKind::Request => {
            let handler = processor.handle_request(&message);
            responder.invoke_and_send_response(&message, handler).await;
        }
        MessageKind::Event => {
            if let Err(error) = processor.handle_event(&message).await {
                warn!(
                    error = %error,
                    msg_type = message.message_type(),
                    from = %message.source(),
                    "event handler failed, dropping event"
                );
            }
        }
    }
}

/// The subscriber handed to the bus: submits every delivery to the
/// listener's executor and returns.
struct DeliveryEndpoint {
    processor: Arc<dyn MessageProcessor>,
    responder: RequestResponder,
    executor: Executor,
}

#[async_trait]
impl BusSubscriber for DeliveryEndpoint {
    async fn deliver(&self, message: PlatformMessage) {
        let processor = Arc::clone(&self.processor);
        let responder = self.responder.clone();
        self.executor
            .submit(dispatch(processor, responder, message))
            .await;
    }
}

/// Generic per-listener dispatch skeleton.
pub struct BusListener {
    name: String,
    responder: RequestResponder,
    executor: Executor,
    processor: Arc<dyn MessageProcessor>,
    matchers: Vec<AddressMatcher>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl BusListener {
    /// Builds a listener that will subscribe with `matchers` once started.
    pub fn new(
        name: impl Into<String>,
        bus: SharedBus,
        processor: Arc<dyn MessageProcessor>,
        executor: Executor,
        matchers: Vec<AddressMatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            responder: RequestResponder::new(bus),
            executor,
            processor,
            matchers,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus this listener responds on.
    pub fn bus(&self) -> &SharedBus {
        self.responder.bus()
    }

    fn endpoint(&self) -> Arc<DeliveryEndpoint> {
        Arc::new(DeliveryEndpoint {
            processor: Arc::clone(&self.processor),
            responder: self.responder.clone(),
            executor: self.executor.clone(),
        })
    }

    /// Registers `matchers` with the bus and records the subscription.
    pub fn listen(&self, matchers: Vec<AddressMatcher>) {
        let subscription = self
            .bus()
            .add_listener(matchers, self.endpoint() as Arc<dyn BusSubscriber>);
        self.subscriptions.lock().push(subscription);
    }

    /// Removes every recorded subscription. Safe to call repeatedly.
    pub fn unlisten(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &subscriptions {
            subscription.remove();
        }
    }

    /// Feeds one message through the listener, exactly as a bus delivery
    /// would.
    pub async fn deliver(&self, message: PlatformMessage) {
        let processor = Arc::clone(&self.processor);
        let responder = self.responder.clone();
        self.executor
            .submit(dispatch(processor, responder, message))
            .await;
    }

    /// Post-construction initialization; runs the processor's init hook.
    pub async fn init(&self) {
        self.processor.on_init().await;
    }

    /// Warms up the processor, then begins consuming from the bus.
    pub async fn start(&self) {
        self.processor.on_start().await;
        let matchers = self.matchers.clone();
        if !matchers.is_empty() {
            self.listen(matchers);
        }
        debug!(listener = %self.name, "listener started");
    }

    /// Stops consuming, runs the teardown hook, then shuts the executor
    /// down. Safe to call more than once.
    pub async fn stop(&self) {
        self.unlisten();
        self.processor.on_stop().await;
        self.executor.shutdown();
        debug!(listener = %self.name, "listener stopped");
    }
}

impl std::fmt::Debug for BusListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusListener")
            .field("name", &self.name)
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}
