//! Client-side request outcomes.

use thiserror::Error;

use hearth_core::BusError;

/// Terminal failure of a correlated request.
///
/// The outcome of a request is an explicit enum, not an unwound exception:
/// success, error response, and timeout are ordinary values the caller
/// matches on.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request carried no (or an empty) correlation id. Nothing was
    /// sent; this is a caller bug.
    #[error("request has no correlation id")]
    MissingCorrelationId,

    /// A request with the same correlation id is already in flight. Nothing
    /// was sent; this is a caller bug, not a retryable condition.
    #[error("correlation id [{0}] already has a request in flight")]
    DuplicateCorrelationId(String),

    /// The bus rejected the send. The pending entry was cleaned up.
    #[error(transparent)]
    Send(#[from] BusError),

    /// The peer answered with an error-classified message.
    #[error("request failed: {code}: {message}")]
    ErrorResponse { code: String, message: String },

    /// No matching response arrived before the deadline.
    #[error("request timed out")]
    TimedOut,

    /// The client was torn down while the request was pending.
    #[error("request canceled")]
    Canceled,
}

impl RequestError {
    /// The error code, for error-response outcomes.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ErrorResponse { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}
