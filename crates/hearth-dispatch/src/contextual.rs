//! Context-resolving dispatch.
//!
//! A [`ContextualDispatcher`] sits in front of per-message-type handlers and
//! resolves the destination address to a stateful context object before a
//! handler runs. Destinations come in two shapes (see
//! [`DestinationKind`]): *static* requests target the service itself and
//! skip resolution; *instance* requests target one entity, loaded through
//! the module-supplied [`ContextLoader`].
//!
//! "Not found" and "loader failed" are different things: the loader
//! returning `Ok(None)` is an expected outcome and yields the structured
//! not-found error naming the address; the loader returning `Err` is a
//! defect, logged and rendered as the generic error.
//!
//! Events get one deliberate asymmetry: a *broadcast* (or service-level)
//! event that fails is only logged — there is no reply target — but a
//! failing handler for an event addressed to a concrete instance sends an
//! error message back to the event's source, so fire-and-forget senders can
//! still observe handling failures they care about.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use hearth_core::bus::SharedBus;
use hearth_core::{
    AddressMatcher, DestinationKind, DispatchError, ErrorBody, MessageBody, PlatformMessage,
};

use crate::error::RegistryError;
use crate::listener::MessageProcessor;

/// Resolves a destination instance id to a context object.
///
/// Supplied by the owning module; typically backed by a persistence lookup.
/// `Ok(None)` means the instance does not exist (an expected outcome);
/// `Err` means the lookup itself failed.
#[async_trait]
pub trait ContextLoader<C>: Send + Sync {
    async fn load(&self, id: &str, qualifier: Option<u32>)
    -> Result<Option<C>, DispatchError>;
}

/// Handles requests of one message type against a resolved context.
#[async_trait]
pub trait ContextualRequestHandler<C>: Send + Sync {
    /// Handles a request addressed to a concrete instance.
    async fn handle(
        &self,
        context: C,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError>;

    /// Handles a request addressed to the service itself (no instance id).
    /// The default refuses: most contextual operations need an instance.
    async fn handle_static(
        &self,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError> {
        Ok(ErrorBody::unsupported_operation(format!(
            "{} requires an instance id in the destination",
            message.message_type()
        ))
        .into_body())
    }
}

/// Handles events of one type against a resolved context.
#[async_trait]
pub trait ContextualEventHandler<C>: Send + Sync {
    async fn handle(&self, context: C, message: &PlatformMessage)
    -> Result<(), DispatchError>;
}

/// Handles events of one type that arrive as broadcasts or service-level
/// events, with no instance to resolve.
#[async_trait]
pub trait BroadcastEventHandler: Send + Sync {
    async fn handle(&self, message: &PlatformMessage) -> Result<(), DispatchError>;
}

struct ContextualEventBinding<C> {
    source: Option<AddressMatcher>,
    handler: Arc<dyn ContextualEventHandler<C>>,
}

/// Dispatcher that loads a per-destination context before handling.
pub struct ContextualDispatcher<C> {
    bus: SharedBus,
    loader: Arc<dyn ContextLoader<C>>,
    requests: HashMap<String, Arc<dyn ContextualRequestHandler<C>>>,
    events: HashMap<String, ContextualEventBinding<C>>,
    broadcast_events: HashMap<String, Arc<dyn BroadcastEventHandler>>,
}

impl<C> ContextualDispatcher<C>
where
    C: Send + Sync + 'static,
{
    pub fn builder(bus: SharedBus, loader: Arc<dyn ContextLoader<C>>) -> ContextualDispatcherBuilder<C> {
        ContextualDispatcherBuilder {
            bus,
            loader,
            requests: Vec::new(),
            events: Vec::new(),
            broadcast_events: Vec::new(),
        }
    }

    async fn request_for_instance(
        &self,
        handler: &Arc<dyn ContextualRequestHandler<C>>,
        id: &str,
        qualifier: Option<u32>,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError> {
        match self.loader.load(id, qualifier).await {
            Ok(Some(context)) => handler.handle(context, message).await,
            Ok(None) => {
                let destination = message.destination_or_broadcast();
                debug!(to = %destination, "no context at destination");
                Ok(ErrorBody::not_found(&destination).into_body())
            }
            Err(error) => {
                warn!(
                    error = %error,
                    to = %message.destination_or_broadcast(),
                    "context loader failed"
                );
                Ok(error.to_error_body().into_body())
            }
        }
    }

    async fn event_for_instance(
        &self,
        binding: &ContextualEventBinding<C>,
        id: &str,
        qualifier: Option<u32>,
        message: &PlatformMessage,
    ) -> Result<(), DispatchError> {
        if let Some(matcher) = &binding.source {
            if !matcher.matches(message.source()) {
                debug!(
                    msg_type = message.message_type(),
                    from = %message.source(),
                    "event source rejected by filter"
                );
                return Ok(());
            }
        }
        match self.loader.load(id, qualifier).await {
            Ok(Some(context)) => binding.handler.handle(context, message).await,
            Ok(None) => Err(DispatchError::status(
                hearth_core::errors::CODE_NOT_FOUND,
                format!(
                    "No object was found at address {}",
                    message.destination_or_broadcast()
                ),
            )),
            Err(error) => Err(error),
        }
    }

    /// Reports a contextual event failure back to the event's source.
    async fn report_event_failure(&self, message: &PlatformMessage, error: DispatchError) {
        warn!(
            error = %error,
            msg_type = message.message_type(),
            from = %message.source(),
            "contextual event handler failed, notifying source"
        );
        let notification = PlatformMessage::error_to(message, error.to_error_body());
        if let Err(send_error) = self.bus.send(notification).await {
            warn!(error = %send_error, "failed to send event failure notification");
        }
    }
}

#[async_trait]
impl<C> MessageProcessor for ContextualDispatcher<C>
where
    C: Send + Sync + 'static,
{
    async fn handle_request(
        &self,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError> {
        let Some(handler) = self.requests.get(message.message_type()) else {
            return Ok(
                ErrorBody::unsupported_message_type(message.message_type()).into_body()
            );
        };
        let destination = message.destination_or_broadcast();
        match destination.destination_kind() {
            DestinationKind::Static => handler.handle_static(message).await,
            DestinationKind::Instance { id, qualifier } => {
                self.request_for_instance(handler, id, qualifier, message)
                    .await
            }
        }
    }

    async fn handle_event(&self, message: &PlatformMessage) -> Result<(), DispatchError> {
        let destination = message.destination_or_broadcast();
        let instance = match destination.destination_kind() {
            DestinationKind::Instance { id, qualifier } if !destination.is_broadcast() => {
                Some((id.to_string(), qualifier))
            }
            _ => None,
        };

        match instance {
            None => {
                // Broadcast or service-level event: no reply target exists,
                // so a failing handler is only logged.
                if let Some(handler) = self.broadcast_events.get(message.message_type()) {
                    if let Err(error) = handler.handle(message).await {
                        warn!(
                            error = %error,
                            msg_type = message.message_type(),
                            "broadcast event handler failed"
                        );
                    }
                } else {
                    debug!(
                        msg_type = message.message_type(),
                        "no handler for broadcast event type"
                    );
                }
            }
            Some((id, qualifier)) => {
                let Some(binding) = self.events.get(message.message_type()) else {
                    debug!(
                        msg_type = message.message_type(),
                        "no handler for contextual event type"
                    );
                    return Ok(());
                };
                if let Err(error) = self
                    .event_for_instance(binding, &id, qualifier, message)
                    .await
                {
                    self.report_event_failure(message, error).await;
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`ContextualDispatcher`]; duplicate keys fail at build.
pub struct ContextualDispatcherBuilder<C> {
    bus: SharedBus,
    loader: Arc<dyn ContextLoader<C>>,
    requests: Vec<(String, Arc<dyn ContextualRequestHandler<C>>)>,
    events: Vec<(String, Option<AddressMatcher>, Arc<dyn ContextualEventHandler<C>>)>,
    broadcast_events: Vec<(String, Arc<dyn BroadcastEventHandler>)>,
}

impl<C> ContextualDispatcherBuilder<C>
where
    C: Send + Sync + 'static,
{
    /// Registers a contextual request handler for `message_type`.
    pub fn request(
        mut self,
        message_type: impl Into<String>,
        handler: Arc<dyn ContextualRequestHandler<C>>,
    ) -> Self {
        self.requests.push((message_type.into(), handler));
        self
    }

    /// Registers a contextual event handler for `event_type`, any source.
    pub fn event(
        mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn ContextualEventHandler<C>>,
    ) -> Self {
        self.events.push((event_type.into(), None, handler));
        self
    }

    /// Registers a contextual event handler accepting only events whose
    /// source matches `source`.
    pub fn event_from(
        mut self,
        event_type: impl Into<String>,
        source: AddressMatcher,
        handler: Arc<dyn ContextualEventHandler<C>>,
    ) -> Self {
        self.events.push((event_type.into(), Some(source), handler));
        self
    }

    /// Registers a handler for broadcast / service-level events of
    /// `event_type`.
    pub fn broadcast_event(
        mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn BroadcastEventHandler>,
    ) -> Self {
        self.broadcast_events.push((event_type.into(), handler));
        self
    }

    /// Finalizes the dispatcher, rejecting duplicate registrations.
    pub fn build(self) -> Result<ContextualDispatcher<C>, RegistryError> {
        let mut requests = HashMap::new();
        for (message_type, handler) in self.requests {
            if requests.insert(message_type.clone(), handler).is_some() {
                return Err(RegistryError::DuplicateRequestHandler(message_type));
            }
        }
        let mut events = HashMap::new();
        for (event_type, source, handler) in self.events {
            let binding = ContextualEventBinding { source, handler };
            if events.insert(event_type.clone(), binding).is_some() {
                return Err(RegistryError::DuplicateEventHandler(event_type));
            }
        }
        let mut broadcast_events = HashMap::new();
        for (event_type, handler) in self.broadcast_events {
            if broadcast_events.insert(event_type.clone(), handler).is_some() {
                return Err(RegistryError::DuplicateEventHandler(event_type));
            }
        }
        Ok(ContextualDispatcher {
            bus: self.bus,
            loader: self.loader,
            requests,
            events,
            broadcast_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBus;

    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use hearth_core::errors;
    use hearth_core::{Address, MessageBody};

    #[derive(Clone, Debug, PartialEq)]
    struct Device {
        id: String,
        name: String,
    }

    struct MapLoader {
        devices: Mutex<StdHashMap<String, Device>>,
        fail: bool,
    }

    impl MapLoader {
        fn with(devices: &[(&str, &str)]) -> Arc<Self> {
            let map = devices
                .iter()
                .map(|(id, name)| {
                    (
                        id.to_string(),
                        Device {
                            id: id.to_string(),
                            name: name.to_string(),
                        },
                    )
                })
                .collect();
            Arc::new(Self {
                devices: Mutex::new(map),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl ContextLoader<Device> for MapLoader {
        async fn load(
            &self,
            id: &str,
            _qualifier: Option<u32>,
        ) -> Result<Option<Device>, DispatchError> {
            if self.fail {
                return Err(DispatchError::internal("store offline"));
            }
            Ok(self.devices.lock().get(id).cloned())
        }
    }

    struct NameHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContextualRequestHandler<Device> for NameHandler {
        async fn handle(
            &self,
            context: Device,
            _message: &PlatformMessage,
        ) -> Result<MessageBody, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MessageBody::builder("dev:GetNameResponse")
                .attribute("name", context.name)
                .build())
        }
    }

    fn request_for(destination: Address) -> PlatformMessage {
        PlatformMessage::builder()
            .from(Address::service("CLNT", "ui"))
            .to(destination)
            .request(true)
            .correlation_id("corr-1")
            .payload(MessageBody::builder("dev:GetName").build())
            .build()
    }

    fn dispatcher(
        loader: Arc<MapLoader>,
        handler: Arc<NameHandler>,
    ) -> (Arc<RecordingBus>, ContextualDispatcher<Device>) {
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = ContextualDispatcher::builder(bus.clone(), loader)
            .request("dev:GetName", handler)
            .build()
            .unwrap();
        (bus, dispatcher)
    }

    #[tokio::test]
    async fn resolved_context_reaches_the_handler_once() {
        let handler = Arc::new(NameHandler {
            calls: AtomicUsize::new(0),
        });
        let (_bus, dispatcher) =
            dispatcher(MapLoader::with(&[("d-1", "porch light")]), handler.clone());

        let body = dispatcher
            .handle_request(&request_for(Address::instance("DRIV", "dev", "d-1")))
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(body.string_attribute("name"), Some("porch light"));
    }

    #[tokio::test]
    async fn missing_context_yields_not_found_naming_the_address() {
        let handler = Arc::new(NameHandler {
            calls: AtomicUsize::new(0),
        });
        let (_bus, dispatcher) = dispatcher(MapLoader::with(&[]), handler.clone());

        let body = dispatcher
            .handle_request(&request_for(Address::instance("DRIV", "dev", "ghost")))
            .await
            .unwrap();

        let error = ErrorBody::from_body(&body).unwrap();
        assert_eq!(error.code(), errors::CODE_NOT_FOUND);
        assert!(error.message().contains("DRIV:dev:ghost"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn static_destination_invokes_the_static_path() {
        let handler = Arc::new(NameHandler {
            calls: AtomicUsize::new(0),
        });
        let (_bus, dispatcher) =
            dispatcher(MapLoader::with(&[("d-1", "porch light")]), handler.clone());

        let body = dispatcher
            .handle_request(&request_for(Address::service("DRIV", "dev")))
            .await
            .unwrap();

        let error = ErrorBody::from_body(&body).unwrap();
        assert_eq!(error.code(), errors::CODE_UNSUPPORTED_OPERATION);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn loader_failure_is_a_generic_error() {
        let loader = Arc::new(MapLoader {
            devices: Mutex::new(StdHashMap::new()),
            fail: true,
        });
        let handler = Arc::new(NameHandler {
            calls: AtomicUsize::new(0),
        });
        let (_bus, dispatcher) = dispatcher(loader, handler);

        let body = dispatcher
            .handle_request(&request_for(Address::instance("DRIV", "dev", "d-1")))
            .await
            .unwrap();
        let error = ErrorBody::from_body(&body).unwrap();
        assert_eq!(error.code(), errors::CODE_GENERIC);
    }

    #[tokio::test]
    async fn unknown_request_type_is_unsupported() {
        let (_bus, dispatcher) = dispatcher(
            MapLoader::with(&[]),
            Arc::new(NameHandler {
                calls: AtomicUsize::new(0),
            }),
        );
        let message = PlatformMessage::builder()
            .from(Address::service("CLNT", "ui"))
            .to(Address::instance("DRIV", "dev", "d-1"))
            .request(true)
            .payload(MessageBody::builder("dev:Bogus").build())
            .build();
        let body = dispatcher.handle_request(&message).await.unwrap();
        assert_eq!(
            ErrorBody::from_body(&body).unwrap().code(),
            errors::CODE_UNSUPPORTED_TYPE
        );
    }

    struct FailingEventHandler;

    #[async_trait]
    impl ContextualEventHandler<Device> for FailingEventHandler {
        async fn handle(
            &self,
            _context: Device,
            _message: &PlatformMessage,
        ) -> Result<(), DispatchError> {
            Err(DispatchError::internal("event boom"))
        }
    }

    struct CountingBroadcastHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl BroadcastEventHandler for CountingBroadcastHandler {
        async fn handle(&self, _message: &PlatformMessage) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DispatchError::internal("broadcast boom"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn contextual_event_failure_notifies_the_source() {
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = ContextualDispatcher::builder(
            bus.clone() as SharedBus,
            MapLoader::with(&[("d-1", "porch light")]) as Arc<dyn ContextLoader<Device>>,
        )
        .event("dev:Changed", Arc::new(FailingEventHandler))
        .build()
        .unwrap();

        let event = PlatformMessage::event(
            MessageBody::builder("dev:Changed").build(),
            Address::service("CLNT", "ui"),
            Address::instance("DRIV", "dev", "d-1"),
        );
        dispatcher.handle_event(&event).await.unwrap();

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_error());
        assert_eq!(sent[0].destination(), Some(event.source()));
    }

    #[tokio::test]
    async fn broadcast_event_failure_is_only_logged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = ContextualDispatcher::builder(
            bus.clone() as SharedBus,
            MapLoader::with(&[]) as Arc<dyn ContextLoader<Device>>,
        )
        .broadcast_event(
            "base:Added",
            Arc::new(CountingBroadcastHandler {
                calls: Arc::clone(&calls),
                fail: true,
            }),
        )
        .build()
        .unwrap();

        let event = PlatformMessage::broadcast(
            MessageBody::builder("base:Added").build(),
            Address::platform_service("scheduler"),
        );
        dispatcher.handle_event(&event).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(bus.sent().is_empty());
    }
}
