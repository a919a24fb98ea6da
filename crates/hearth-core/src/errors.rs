//! The uniform error payload.
//!
//! Every protocol-level failure on the bus — unsupported message type,
//! unsupported destination, missing context, handler failure — is reported
//! as a body of type `Error` with `code` and `message` attributes, never as
//! an exception crossing a dispatch boundary. [`ErrorBody`] is that payload
//! as a value, with constructors for the canonical codes.

use std::fmt;

use crate::address::Address;
use crate::body::MessageBody;

/// Body type of error payloads.
pub const TYPE_ERROR: &str = "Error";

/// Attribute key carrying the error code.
pub const ATTR_CODE: &str = "code";
/// Attribute key carrying the human-readable error message.
pub const ATTR_MESSAGE: &str = "message";

/// Code for exception-derived errors with no more specific classification.
pub const CODE_GENERIC: &str = "UnknownError";
/// Code for requests whose message type has no registered handler.
pub const CODE_UNSUPPORTED_TYPE: &str = "UnsupportedMessageType";
/// Code for requests addressed to a destination no service owns.
pub const CODE_UNSUPPORTED_ADDRESS: &str = "UnsupportedDestinationAddress";
/// Code for operations a handler does not support at this destination.
pub const CODE_UNSUPPORTED_OPERATION: &str = "UnsupportedOperation";
/// Code for destinations whose context could not be resolved.
pub const CODE_NOT_FOUND: &str = "request.destination.notfound";

/// The `{code, message}` error payload, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    code: String,
    message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error for a request whose message type has no handler.
    pub fn unsupported_message_type(message_type: &str) -> Self {
        Self::new(
            CODE_UNSUPPORTED_TYPE,
            format!("Unsupported message type {message_type}"),
        )
    }

    /// Error for a request routed to an address no service owns.
    pub fn unsupported_address(destination: &Address) -> Self {
        Self::new(
            CODE_UNSUPPORTED_ADDRESS,
            format!("No service handles address {destination}"),
        )
    }

    /// Error for an operation the handler cannot perform at this destination.
    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(CODE_UNSUPPORTED_OPERATION, message)
    }

    /// Error for a destination whose context does not exist.
    pub fn not_found(destination: &Address) -> Self {
        Self::new(
            CODE_NOT_FOUND,
            format!("No object was found at address {destination}"),
        )
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders this error as a `MessageBody` of type [`TYPE_ERROR`].
    pub fn into_body(self) -> MessageBody {
        MessageBody::builder(TYPE_ERROR)
            .attribute(ATTR_CODE, self.code)
            .attribute(ATTR_MESSAGE, self.message)
            .build()
    }

    /// Extracts an error from a body of type [`TYPE_ERROR`].
    ///
    /// Missing attributes fall back to the generic code / an empty message,
    /// so a malformed error payload still yields a usable value.
    pub fn from_body(body: &MessageBody) -> Option<Self> {
        if !body.is_error() {
            return None;
        }
        Some(Self::new(
            body.string_attribute(ATTR_CODE).unwrap_or(CODE_GENERIC),
            body.string_attribute(ATTR_MESSAGE).unwrap_or_default(),
        ))
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<ErrorBody> for MessageBody {
    fn from(error: ErrorBody) -> Self {
        error.into_body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_round_trips_through_message_body() {
        let body = ErrorBody::unsupported_message_type("scheduler:Bogus").into_body();
        assert!(body.is_error());
        let parsed = ErrorBody::from_body(&body).unwrap();
        assert_eq!(parsed.code(), CODE_UNSUPPORTED_TYPE);
        assert!(parsed.message().contains("scheduler:Bogus"));
    }

    #[test]
    fn not_found_names_the_address() {
        let addr = Address::instance("SERV", "scheduler", "abc");
        let error = ErrorBody::not_found(&addr);
        assert_eq!(error.code(), CODE_NOT_FOUND);
        assert!(error.message().contains("SERV:scheduler:abc"));
    }

    #[test]
    fn non_error_bodies_do_not_parse() {
        assert!(ErrorBody::from_body(&MessageBody::empty()).is_none());
    }

    #[test]
    fn malformed_error_bodies_fall_back_to_generic_code() {
        let body = MessageBody::builder(TYPE_ERROR).build();
        let parsed = ErrorBody::from_body(&body).unwrap();
        assert_eq!(parsed.code(), CODE_GENERIC);
        assert_eq!(parsed.message(), "");
    }
}
