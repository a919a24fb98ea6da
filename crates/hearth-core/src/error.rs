//! Error types for the Hearth core.
//!
//! Protocol-level conditions (unsupported type, not found, ...) are *values*
//! — see [`crate::errors::ErrorBody`] — and never cross a dispatch boundary
//! as `Err`. The types here cover the remaining failure classes: malformed
//! input at construction time, transport failures, and handler failures on
//! their way to becoming an error body.

use thiserror::Error;

use crate::errors::{self, ErrorBody};

/// A malformed address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// Not of the form `namespace:group:id`, `namespace:group:` or empty.
    #[error("invalid address [{0}], expected [namespace:group:id] or [namespace:group:]")]
    Malformed(String),

    /// The qualifier suffix after `.` was not an integer.
    #[error("invalid qualifier in address [{0}]")]
    Qualifier(String),
}

impl AddressParseError {
    pub(crate) fn malformed(raw: &str) -> Self {
        Self::Malformed(raw.to_string())
    }

    pub(crate) fn qualifier(raw: &str) -> Self {
        Self::Qualifier(raw.to_string())
    }
}

/// A malformed matcher pattern string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherParseError {
    /// Wildcards in an unsupported position.
    #[error("invalid matcher pattern [{0}]")]
    Pattern(String),

    /// The pattern was not a wildcard form and failed to parse as an address.
    #[error(transparent)]
    Address(#[from] AddressParseError),
}

impl MatcherParseError {
    pub(crate) fn pattern(raw: &str) -> Self {
        Self::Pattern(raw.to_string())
    }
}

/// Transport-level failures surfaced by [`crate::bus::MessageBus::send`].
///
/// These are not retried by the core; callers decide.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The underlying transport rejected or dropped the message.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The bus has been shut down.
    #[error("bus is closed")]
    Closed,
}

/// A failure escaping a message handler.
///
/// `Status` carries a protocol error code and renders to the matching
/// [`ErrorBody`]; everything else renders to the generic exception-derived
/// code. Handlers return this; the dispatch layer converts it — handler
/// errors never propagate past [`crate::bus::RequestResponder::invoke`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A structured protocol error with an explicit code.
    #[error("{message}")]
    Status { code: String, message: String },

    /// The bus failed while the handler was doing its work.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Any other handler failure.
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    /// A structured protocol error.
    pub fn status(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            code: code.into(),
            message: message.into(),
        }
    }

    /// An unclassified handler failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Renders this error as the uniform `{code, message}` error body.
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            Self::Status { code, message } => ErrorBody::new(code.clone(), message.clone()),
            other => ErrorBody::new(errors::CODE_GENERIC, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_their_code() {
        let err = DispatchError::status("scheduler.task.invalid", "bad cron expression");
        let body = err.to_error_body();
        assert_eq!(body.code(), "scheduler.task.invalid");
        assert_eq!(body.message(), "bad cron expression");
    }

    #[test]
    fn internal_errors_render_with_the_generic_code() {
        let err = DispatchError::internal("database unavailable");
        let body = err.to_error_body();
        assert_eq!(body.code(), errors::CODE_GENERIC);
        assert_eq!(body.message(), "database unavailable");
    }
}
