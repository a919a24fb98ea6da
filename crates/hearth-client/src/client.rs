//! The correlated request client.
//!
//! [`PlatformBusClient`] gives callers a synchronous-feeling request API
//! over the asynchronous bus: publish a request carrying a correlation id,
//! get back a [`ResponseFuture`] that resolves when the matching response
//! (or error, or the deadline) arrives.
//!
//! # Per-request state machine
//!
//! ```text
//! CREATED ──send──▶ SENT ──┬─▶ RESOLVED(success)
//!                          ├─▶ RESOLVED(error)
//!                          ├─▶ TIMED_OUT
//!                          └─▶ CANCELLED (future dropped)
//! ```
//!
//! All right-hand states are terminal and mutually exclusive: the pending
//! entry is removed from the correlation table under its lock before the
//! result is delivered, so whichever of response / timer / drop gets there
//! first wins and the others are no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use hearth_core::bus::{BusSubscriber, SharedBus, Subscription};
use hearth_core::{AddressMatcher, ErrorBody, PlatformMessage};

use crate::error::RequestError;
use crate::future::ResponseFuture;

/// Default deadline applied when a request carries no time-to-live.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct Pending {
    tx: oneshot::Sender<Result<PlatformMessage, RequestError>>,
    timer: Option<JoinHandle<()>>,
}

pub(crate) struct ClientInner {
    bus: SharedBus,
    pending: Mutex<HashMap<String, Pending>>,
    default_timeout: Duration,
}

impl ClientInner {
    /// Removes and resolves the entry for `correlation_id`, if still
    /// pending. The removal under the lock is what makes first resolution
    /// win; late arrivals find nothing.
    fn resolve(&self, correlation_id: &str, result: Result<PlatformMessage, RequestError>) {
        let Some(entry) = self.pending.lock().remove(correlation_id) else {
            trace!(correlation = correlation_id, "no pending request, ignoring");
            return;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        // The receiver may already be dropped; that cancellation also
        // removed nothing here, so the send result is irrelevant.
        let _ = entry.tx.send(result);
    }

    /// Drops the bookkeeping for `correlation_id` without resolving.
    pub(crate) fn cancel(&self, correlation_id: &str) {
        if let Some(entry) = self.pending.lock().remove(correlation_id) {
            debug!(correlation = correlation_id, "request canceled");
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    fn expire(&self, correlation_id: &str) {
        self.resolve(correlation_id, Err(RequestError::TimedOut));
    }

    fn complete(&self, message: PlatformMessage) {
        let Some(correlation_id) = message.correlation_id().map(str::to_string) else {
            return;
        };
        let result = if message.is_error() {
            let error = ErrorBody::from_body(message.body())
                .unwrap_or_else(|| ErrorBody::new(hearth_core::errors::CODE_GENERIC, ""));
            Err(RequestError::ErrorResponse {
                code: error.code().to_string(),
                message: error.message().to_string(),
            })
        } else {
            Ok(message)
        };
        self.resolve(&correlation_id, result);
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Routes inbound bus traffic into the correlation table.
struct ResponseRouter {
    inner: Arc<ClientInner>,
}

#[async_trait]
impl BusSubscriber for ResponseRouter {
    async fn deliver(&self, message: PlatformMessage) {
        self.inner.complete(message);
    }
}

/// Outbound correlated-request API with timeout.
pub struct PlatformBusClient {
    inner: Arc<ClientInner>,
    subscription: Subscription,
}

impl PlatformBusClient {
    /// Builds a client listening for responses on the addresses accepted by
    /// `matchers` (typically the caller's own address), with
    /// [`DEFAULT_TIMEOUT`] as the fallback deadline.
    pub fn new(bus: SharedBus, matchers: Vec<AddressMatcher>) -> Self {
        Self::with_timeout(bus, matchers, DEFAULT_TIMEOUT)
    }

    /// Builds a client with an explicit fallback deadline.
    pub fn with_timeout(
        bus: SharedBus,
        matchers: Vec<AddressMatcher>,
        default_timeout: Duration,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            bus,
            pending: Mutex::new(HashMap::new()),
            default_timeout,
        });
        let subscription = inner.bus.add_listener(
            matchers,
            Arc::new(ResponseRouter {
                inner: Arc::clone(&inner),
            }),
        );
        Self {
            inner,
            subscription,
        }
    }

    /// Sends `message` and returns a future resolving to its response.
    ///
    /// The message must carry a non-empty correlation id that is not
    /// already in flight; violations fail the returned future immediately,
    /// before anything is sent. The deadline is the larger of the message's
    /// time-to-live and the client's default timeout. Dropping the returned
    /// future abandons the request and releases its bookkeeping.
    pub async fn request(&self, message: PlatformMessage) -> ResponseFuture {
        let correlation_id = match message.correlation_id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return ResponseFuture::failed(RequestError::MissingCorrelationId),
        };

        let deadline = message
            .time_to_live()
            .unwrap_or(Duration::ZERO)
            .max(self.inner.default_timeout);

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock();
            if pending.contains_key(&correlation_id) {
                return ResponseFuture::failed(RequestError::DuplicateCorrelationId(
                    correlation_id,
                ));
            }
            pending.insert(correlation_id.clone(), Pending { tx, timer: None });
        }

        if let Err(error) = self.inner.bus.send(message).await {
            warn!(correlation = %correlation_id, error = %error, "request send failed");
            self.inner.cancel(&correlation_id);
            return ResponseFuture::failed(RequestError::Send(error));
        }

        let timer = tokio::spawn({
            let inner = Arc::clone(&self.inner);
            let correlation_id = correlation_id.clone();
            async move {
                tokio::time::sleep(deadline).await;
                inner.expire(&correlation_id);
            }
        });
        {
            let mut pending = self.inner.pending.lock();
            match pending.get_mut(&correlation_id) {
                // The response may have raced the timer arm; in that case
                // the entry is gone and the timer has nothing to guard.
                None => timer.abort(),
                Some(entry) => entry.timer = Some(timer),
            }
        }

        ResponseFuture::pending(rx, Arc::clone(&self.inner), correlation_id)
    }

    /// Detaches the client from the bus. In-flight requests can then only
    /// finish by timeout or cancellation.
    pub fn shutdown(&self) {
        self.subscription.remove();
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }
}

impl std::fmt::Debug for PlatformBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformBusClient")
            .field("pending", &self.inner.pending.lock().len())
            .field("default_timeout", &self.inner.default_timeout)
            .finish()
    }
}
