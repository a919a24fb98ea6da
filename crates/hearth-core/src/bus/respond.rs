//! Request/response semantics over a plain bus.
//!
//! [`RequestResponder::invoke`] runs a request handler with a diagnostic
//! span derived from the request active, and converts any handler failure
//! into a structured error body — the call itself never fails.
//! [`RequestResponder::invoke_and_send_response`] then publishes the result
//! as the response, unless the handler opted out with the
//! [`MessageBody::no_response`] sentinel.
//!
//! Together these give the guarantee the dispatch layer relies on: a request
//! receives at most one response, and handler misbehavior cannot leave a
//! request unanswered except via the explicit opt-out.

use std::future::Future;

use tracing::{Instrument, debug_span, warn};

use super::SharedBus;
use crate::body::MessageBody;
use crate::error::DispatchError;
use crate::message::PlatformMessage;

/// Request/response helper bound to a bus.
#[derive(Clone)]
pub struct RequestResponder {
    bus: SharedBus,
}

impl RequestResponder {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// Runs `handler` under the request's diagnostic context and returns its
    /// body, converting an `Err` into a structured error body. Never fails.
    pub async fn invoke<F>(&self, request: &PlatformMessage, handler: F) -> MessageBody
    where
        F: Future<Output = Result<MessageBody, DispatchError>>,
    {
        let span = debug_span!(
            "invoke",
            msg_type = request.message_type(),
            from = %request.source(),
            to = %request.destination_or_broadcast(),
            correlation = request.correlation_id().unwrap_or(""),
            place = request.place_id().unwrap_or(""),
        );
        async move {
            match handler.await {
                Ok(body) => body,
                Err(error) => {
                    warn!(error = %error, "request handler failed");
                    error.to_error_body().into_body()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs `handler` via [`invoke`](Self::invoke) and publishes the
    /// response, unless the body is the no-response sentinel. Sends at most
    /// one response per request; send failures are logged, not raised.
    pub async fn invoke_and_send_response<F>(&self, request: &PlatformMessage, handler: F)
    where
        F: Future<Output = Result<MessageBody, DispatchError>>,
    {
        let body = self.invoke(request, handler).await;
        if body.is_no_response() {
            return;
        }
        let response = PlatformMessage::respond_to(request, body);
        if let Err(error) = self.bus.send(response).await {
            warn!(
                error = %error,
                correlation = request.correlation_id().unwrap_or(""),
                "failed to send response"
            );
        }
    }
}
