//! The caller-held response future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use hearth_core::PlatformMessage;

use crate::client::ClientInner;
use crate::error::RequestError;

enum State {
    /// Rejected before anything was sent; resolves immediately.
    Failed(Option<RequestError>),
    /// Waiting on the correlation table.
    Pending {
        rx: oneshot::Receiver<Result<PlatformMessage, RequestError>>,
        inner: Arc<ClientInner>,
        correlation_id: String,
        done: bool,
    },
}

/// Resolves to the response matched to one sent request.
///
/// May be polled, blocked on, or chained like any future. Dropping it before
/// completion abandons the request: the pending entry is removed and its
/// timer aborted, so abandonment never leaks bookkeeping.
pub struct ResponseFuture {
    state: State,
}

impl ResponseFuture {
    pub(crate) fn failed(error: RequestError) -> Self {
        Self {
            state: State::Failed(Some(error)),
        }
    }

    pub(crate) fn pending(
        rx: oneshot::Receiver<Result<PlatformMessage, RequestError>>,
        inner: Arc<ClientInner>,
        correlation_id: String,
    ) -> Self {
        Self {
            state: State::Pending {
                rx,
                inner,
                correlation_id,
                done: false,
            },
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<PlatformMessage, RequestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(RequestError::Canceled)))
            }
            State::Pending { rx, done, .. } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => {
                    *done = true;
                    Poll::Ready(result)
                }
                Poll::Ready(Err(_)) => {
                    // Sender dropped without resolving: the client was torn
                    // down while this request was pending.
                    *done = true;
                    Poll::Ready(Err(RequestError::Canceled))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        if let State::Pending {
            inner,
            correlation_id,
            done: false,
            ..
        } = &self.state
        {
            inner.cancel(correlation_id);
        }
    }
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Failed(_) => "failed",
            State::Pending { done: true, .. } => "resolved",
            State::Pending { .. } => "pending",
        };
        f.debug_struct("ResponseFuture").field("state", &state).finish()
    }
}
