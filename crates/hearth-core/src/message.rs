//! The message envelope.
//!
//! A [`PlatformMessage`] wraps a [`MessageBody`] with the headers dispatch
//! needs: source and destination addresses, the correlation id linking a
//! request to its response, the request flag, and the place/population
//! routing hints. Messages are value objects, created per send and never
//! mutated.
//!
//! # Classification
//!
//! Every message is exactly one of request, error event or plain event —
//! see [`MessageKind`]. A request expects a reply; an error event carries an
//! `Error` body; everything else is a fire-and-forget event.
//!
//! # Building
//!
//! ```rust,ignore
//! use hearth_core::{Address, MessageBody, PlatformMessage};
//!
//! let request = PlatformMessage::builder()
//!     .from(Address::service("CLNT", "ui"))
//!     .to(Address::platform_service("scheduler"))
//!     .request(true)
//!     .correlation_id("abc-123")
//!     .payload(MessageBody::builder("scheduler:AddTask").build())
//!     .build();
//!
//! let response = PlatformMessage::respond_to(&request, MessageBody::empty());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::body::MessageBody;
use crate::errors::ErrorBody;

/// Classification of a message; exactly one case holds per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Expects exactly one response (or an explicit opt-out).
    Request,
    /// Carries an `Error` body; never answered.
    Error,
    /// Plain event; never answered (with one dispatcher-level exception for
    /// contextual events, see the dispatch layer).
    Event,
}

/// An addressed, typed message on the platform bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct PlatformMessage {
    source: Address,
    destination: Option<Address>,
    correlation_id: Option<String>,
    is_request: bool,
    place_id: Option<String>,
    population: Option<String>,
    time_to_live: Option<Duration>,
    timestamp_ms: u64,
    body: MessageBody,
}

impl PlatformMessage {
    /// Starts an empty builder. Source defaults to broadcast.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// A request envelope around `body`, from `source` to `destination`.
    pub fn request(body: MessageBody, source: Address, destination: Address) -> Self {
        Self::builder()
            .from(source)
            .to(destination)
            .request(true)
            .payload(body)
            .build()
    }

    /// A broadcast event around `body`.
    pub fn broadcast(body: MessageBody, source: Address) -> Self {
        Self::builder().from(source).payload(body).build()
    }

    /// An event around `body` addressed to a specific destination.
    pub fn event(body: MessageBody, source: Address, destination: Address) -> Self {
        Self::builder()
            .from(source)
            .to(destination)
            .payload(body)
            .build()
    }

    /// Builds the response to `request`: destination and source swap, the
    /// correlation id is reused, and place/population carry over.
    pub fn respond_to(request: &PlatformMessage, body: MessageBody) -> Self {
        Self::builder()
            .from(Address::get(request.destination()))
            .to(request.source().clone())
            .correlation_id_opt(request.correlation_id().map(str::to_string))
            .place_id_opt(request.place_id().map(str::to_string))
            .population_opt(request.population().map(str::to_string))
            .payload(body)
            .build()
    }

    /// Builds an error event answering `message`, addressed to its source.
    ///
    /// Used both for failed requests and for the contextual-event failure
    /// path where a fire-and-forget sender still gets told about the
    /// failure.
    pub fn error_to(message: &PlatformMessage, error: ErrorBody) -> Self {
        Self::respond_to(message, error.into_body())
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn destination(&self) -> Option<&Address> {
        self.destination.as_ref()
    }

    /// The destination, or broadcast when none was set.
    pub fn destination_or_broadcast(&self) -> Address {
        Address::get(self.destination())
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn place_id(&self) -> Option<&str> {
        self.place_id.as_deref()
    }

    pub fn population(&self) -> Option<&str> {
        self.population.as_deref()
    }

    /// How long the sender considers this message deliverable.
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    /// Milliseconds since the epoch at which this envelope was built.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// The message type, delegated to the body.
    pub fn message_type(&self) -> &str {
        self.body.message_type()
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn is_request(&self) -> bool {
        self.is_request
    }

    pub fn is_error(&self) -> bool {
        !self.is_request && self.body.is_error()
    }

    /// Whether the destination is absent or the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.destination_or_broadcast().is_broadcast()
    }

    /// Classifies this message; the three cases partition all messages.
    pub fn kind(&self) -> MessageKind {
        if self.is_request {
            MessageKind::Request
        } else if self.body.is_error() {
            MessageKind::Error
        } else {
            MessageKind::Event
        }
    }
}

/// Chained builder for [`PlatformMessage`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    source: Option<Address>,
    destination: Option<Address>,
    correlation_id: Option<String>,
    is_request: bool,
    place_id: Option<String>,
    population: Option<String>,
    time_to_live: Option<Duration>,
    timestamp_ms: Option<u64>,
    body: Option<MessageBody>,
}

impl MessageBuilder {
    pub fn from(mut self, source: Address) -> Self {
        self.source = Some(source);
        self
    }

    pub fn to(mut self, destination: Address) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Clears the destination, making this a broadcast.
    pub fn to_broadcast(mut self) -> Self {
        self.destination = None;
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn correlation_id_opt(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn request(mut self, is_request: bool) -> Self {
        self.is_request = is_request;
        self
    }

    pub fn place_id(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    pub fn place_id_opt(mut self, place_id: Option<String>) -> Self {
        self.place_id = place_id;
        self
    }

    pub fn population(mut self, population: impl Into<String>) -> Self {
        self.population = Some(population.into());
        self
    }

    pub fn population_opt(mut self, population: Option<String>) -> Self {
        self.population = population;
        self
    }

    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Pins the timestamp instead of sampling the clock at build time.
    pub fn timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn payload(mut self, body: MessageBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Finalizes the message. A missing source defaults to broadcast and a
    /// missing payload to the empty body, so building never fails.
    pub fn build(self) -> PlatformMessage {
        PlatformMessage {
            source: self.source.unwrap_or_else(Address::broadcast),
            destination: self.destination,
            correlation_id: self.correlation_id,
            is_request: self.is_request,
            place_id: self.place_id,
            population: self.population,
            time_to_live: self.time_to_live,
            timestamp_ms: self.timestamp_ms.unwrap_or_else(now_ms),
            body: self.body.unwrap_or_else(MessageBody::empty),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Wire encoding
// =============================================================================

/// The flat wire shape of a message. `type` mirrors the payload's message
/// type and `ttlMs` is -1 when the sender set no time-to-live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    r#type: String,
    source: Address,
    destination: Option<Address>,
    correlation_id: Option<String>,
    is_request: bool,
    is_error: bool,
    place_id: Option<String>,
    population: Option<String>,
    ttl_ms: i64,
    timestamp: u64,
    payload: MessageBody,
}

impl From<PlatformMessage> for WireMessage {
    fn from(message: PlatformMessage) -> Self {
        let is_error = message.is_error();
        Self {
            r#type: message.body.message_type().to_string(),
            source: message.source,
            destination: message.destination,
            correlation_id: message.correlation_id,
            is_request: message.is_request,
            is_error,
            place_id: message.place_id,
            population: message.population,
            ttl_ms: message
                .time_to_live
                .map(|ttl| ttl.as_millis() as i64)
                .unwrap_or(-1),
            timestamp: message.timestamp_ms,
            payload: message.body,
        }
    }
}

impl TryFrom<WireMessage> for PlatformMessage {
    type Error = std::convert::Infallible;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            source: wire.source,
            destination: wire.destination,
            correlation_id: wire.correlation_id,
            is_request: wire.is_request,
            place_id: wire.place_id,
            population: wire.population,
            time_to_live: (wire.ttl_ms >= 0).then(|| Duration::from_millis(wire.ttl_ms as u64)),
            timestamp_ms: wire.timestamp,
            body: wire.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_fixture() -> PlatformMessage {
        PlatformMessage::builder()
            .from(Address::service("CLNT", "ui"))
            .to(Address::platform_service("scheduler"))
            .request(true)
            .correlation_id("abc")
            .place_id("place-1")
            .payload(MessageBody::builder("scheduler:AddTask").build())
            .build()
    }

    #[test]
    fn kind_partitions_messages() {
        let request = request_fixture();
        assert_eq!(request.kind(), MessageKind::Request);

        let error = PlatformMessage::error_to(
            &request,
            ErrorBody::unsupported_message_type("scheduler:AddTask"),
        );
        assert_eq!(error.kind(), MessageKind::Error);

        let event = PlatformMessage::broadcast(
            MessageBody::builder("base:ValueChange").build(),
            Address::platform_service("scheduler"),
        );
        assert_eq!(event.kind(), MessageKind::Event);
    }

    #[test]
    fn respond_to_swaps_addresses_and_keeps_correlation() {
        let request = request_fixture();
        let response = PlatformMessage::respond_to(&request, MessageBody::empty());
        assert_eq!(response.destination(), Some(request.source()));
        assert_eq!(response.source(), &Address::platform_service("scheduler"));
        assert_eq!(response.correlation_id(), Some("abc"));
        assert_eq!(response.place_id(), Some("place-1"));
        assert!(!response.is_request());
    }

    #[test]
    fn error_to_is_error_classified() {
        let request = request_fixture();
        let error = PlatformMessage::error_to(
            &request,
            ErrorBody::not_found(&Address::instance("SERV", "scheduler", "x")),
        );
        assert!(error.is_error());
        assert_eq!(error.destination(), Some(request.source()));
        assert_eq!(error.correlation_id(), Some("abc"));
    }

    #[test]
    fn missing_destination_is_broadcast() {
        let event = PlatformMessage::broadcast(
            MessageBody::empty(),
            Address::platform_service("scheduler"),
        );
        assert!(event.is_broadcast());
        assert!(event.destination().is_none());
        assert!(event.destination_or_broadcast().is_broadcast());
    }

    #[test]
    fn wire_shape_uses_the_documented_field_names() {
        let message = request_fixture();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "scheduler:AddTask");
        assert_eq!(value["source"], "CLNT:ui:");
        assert_eq!(value["destination"], "SERV:scheduler:");
        assert_eq!(value["correlationId"], "abc");
        assert_eq!(value["isRequest"], true);
        assert_eq!(value["isError"], false);
        assert_eq!(value["ttlMs"], -1);
        assert_eq!(value["payload"]["messageType"], "scheduler:AddTask");
    }

    #[test]
    fn wire_round_trip_preserves_the_message() {
        let message = PlatformMessage::builder()
            .from(Address::instance("DRIV", "dev", "d-1"))
            .to(Address::platform_service("rule"))
            .time_to_live(Duration::from_secs(30))
            .timestamp_ms(1_700_000_000_000)
            .payload(MessageBody::builder("rule:Fire").attribute("level", 2).build())
            .build();
        let json = serde_json::to_string(&message).unwrap();
        let parsed: PlatformMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
