//! Dispatch tables.
//!
//! A [`DispatchTable`] maps message types to request handlers and event
//! types to event handlers. Tables are built once through
//! [`DispatchTableBuilder`] — registration is explicit (`register this type
//! to this handler`), duplicate keys are a build-time [`RegistryError`], and
//! the finished table is immutable.
//!
//! Event registrations may carry an optional source-address filter; an
//! event whose source the filter rejects is skipped for that handler.
//!
//! A table is itself a [`MessageProcessor`], so it can be mounted directly
//! behind a [`crate::listener::BusListener`]: unknown request types fall
//! back to the registered fallback or the standard "unsupported message
//! type" error, unknown event types are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use hearth_core::{
    AddressMatcher, DispatchError, ErrorBody, MessageBody, PlatformMessage,
};

use crate::error::RegistryError;
use crate::listener::MessageProcessor;

/// Handles one request message type.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, message: &PlatformMessage) -> Result<MessageBody, DispatchError>;
}

/// Handles one event message type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, message: &PlatformMessage) -> Result<(), DispatchError>;
}

/// Adapts a plain function into a [`RequestHandler`].
pub fn request_fn<F>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(&PlatformMessage) -> Result<MessageBody, DispatchError> + Send + Sync + 'static,
{
    struct FnHandler<F>(F);

    #[async_trait]
    impl<F> RequestHandler for FnHandler<F>
    where
        F: Fn(&PlatformMessage) -> Result<MessageBody, DispatchError> + Send + Sync + 'static,
    {
        async fn handle(
            &self,
            message: &PlatformMessage,
        ) -> Result<MessageBody, DispatchError> {
            (self.0)(message)
        }
    }

    Arc::new(FnHandler(f))
}

/// Adapts a plain function into an [`EventHandler`].
pub fn event_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&PlatformMessage) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    struct FnHandler<F>(F);

    #[async_trait]
    impl<F> EventHandler for FnHandler<F>
    where
        F: Fn(&PlatformMessage) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        async fn handle(&self, message: &PlatformMessage) -> Result<(), DispatchError> {
            (self.0)(message)
        }
    }

    Arc::new(FnHandler(f))
}

struct EventBinding {
    source: Option<AddressMatcher>,
    handler: Arc<dyn EventHandler>,
}

/// Immutable message-type → handler tables.
pub struct DispatchTable {
    requests: HashMap<String, Arc<dyn RequestHandler>>,
    fallback: Option<Arc<dyn RequestHandler>>,
    events: HashMap<String, EventBinding>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// Looks up and runs the request handler for the message's type,
    /// falling back to the registered fallback, then to the standard
    /// "unsupported message type" error body.
    pub async fn dispatch_request(
        &self,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError> {
        let handler = self
            .requests
            .get(message.message_type())
            .or(self.fallback.as_ref());
        match handler {
            Some(handler) => handler.handle(message).await,
            None => {
                debug!(
                    msg_type = message.message_type(),
                    to = %message.destination_or_broadcast(),
                    "request for unsupported message type"
                );
                Ok(ErrorBody::unsupported_message_type(message.message_type()).into_body())
            }
        }
    }

    /// Runs the event handler registered for the message's type, if any and
    /// if its source filter accepts the message's source.
    pub async fn dispatch_event(&self, message: &PlatformMessage) -> Result<(), DispatchError> {
        let Some(binding) = self.events.get(message.message_type()) else {
            debug!(msg_type = message.message_type(), "no handler for event type");
            return Ok(());
        };
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
        binding.handler.handle(message).await
    }

    /// Registered request types, mostly useful for diagnostics.
    pub fn request_types(&self) -> impl Iterator<Item = &str> {
        self.requests.keys().map(String::as_str)
    }
}

#[async_trait]
impl MessageProcessor for DispatchTable {
    async fn handle_request(
        &self,
        message: &PlatformMessage,
    ) -> Result<MessageBody, DispatchError> {
        self.dispatch_request(message).await
    }

    async fn handle_event(&self, message: &PlatformMessage) -> Result<(), DispatchError> {
        self.dispatch_event(message).await
    }
}

/// Builder for [`DispatchTable`]; duplicate keys fail at [`build`](Self::build).
#[derive(Default)]
pub struct DispatchTableBuilder {
    requests: Vec<(String, Arc<dyn RequestHandler>)>,
    fallbacks: Vec<Arc<dyn RequestHandler>>,
    events: Vec<(String, Option<AddressMatcher>, Arc<dyn EventHandler>)>,
}

impl DispatchTableBuilder {
    /// Registers a request handler for `message_type`.
    pub fn request(
        mut self,
        message_type: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        self.requests.push((message_type.into(), handler));
        self
    }

    /// Registers the fallback handler for request types with no entry.
    pub fn fallback(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.fallbacks.push(handler);
        self
    }

    /// Registers an event handler for `event_type`, any source.
    pub fn event(
        self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.event_filtered(event_type, None, handler)
    }

    /// Registers an event handler accepting only events whose source
    /// matches `source`.
    pub fn event_from(
        self,
        event_type: impl Into<String>,
        source: AddressMatcher,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.event_filtered(event_type, Some(source), handler)
    }

    fn event_filtered(
        mut self,
        event_type: impl Into<String>,
        source: Option<AddressMatcher>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.events.push((event_type.into(), source, handler));
        self
    }

    /// Finalizes the table, rejecting duplicate registrations.
    pub fn build(self) -> Result<DispatchTable, RegistryError> {
        let mut requests = HashMap::new();
        for (message_type, handler) in self.requests {
            if requests.insert(message_type.clone(), handler).is_some() {
                return Err(RegistryError::DuplicateRequestHandler(message_type));
            }
        }
        if self.fallbacks.len() > 1 {
            return Err(RegistryError::DuplicateFallback);
        }
        let mut events = HashMap::new();
        for (event_type, source, handler) in self.events {
            let binding = EventBinding { source, handler };
            if events.insert(event_type.clone(), binding).is_some() {
                return Err(RegistryError::DuplicateEventHandler(event_type));
            }
        }
        Ok(DispatchTable {
            requests,
            fallback: self.fallbacks.into_iter().next(),
            events,
        })
    }
}
