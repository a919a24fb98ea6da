//! Message payloads.
//!
//! A [`MessageBody`] is the typed payload of a [`crate::message::PlatformMessage`]:
//! a message type string plus a map of JSON-valued attributes. Bodies are
//! immutable once built.
//!
//! Two sentinel bodies matter to dispatch: [`MessageBody::empty`], the
//! conventional "acknowledged, nothing to report" response, and
//! [`MessageBody::no_response`], which a request handler returns to opt out
//! of responding entirely.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body type of the empty acknowledgement message.
pub const TYPE_EMPTY: &str = "EmptyMessage";
/// Body type of the "send no response" sentinel.
pub const TYPE_NO_RESPONSE: &str = "NoResponse";

/// An immutable typed payload: a message type and its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    message_type: String,
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

impl MessageBody {
    /// Builds a body with the given type and attributes.
    pub fn new(message_type: impl Into<String>, attributes: HashMap<String, Value>) -> Self {
        Self {
            message_type: message_type.into(),
            attributes,
        }
    }

    /// Starts a builder for a body of the given type.
    pub fn builder(message_type: impl Into<String>) -> MessageBodyBuilder {
        MessageBodyBuilder {
            message_type: message_type.into(),
            attributes: HashMap::new(),
        }
    }

    /// The conventional empty acknowledgement.
    pub fn empty() -> Self {
        Self::new(TYPE_EMPTY, HashMap::new())
    }

    /// The sentinel a request handler returns to suppress the response.
    pub fn no_response() -> Self {
        Self::new(TYPE_NO_RESPONSE, HashMap::new())
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Returns the attribute under `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the attribute under `key` as a string slice, if it is one.
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Whether this body is the "send no response" sentinel.
    pub fn is_no_response(&self) -> bool {
        self.message_type == TYPE_NO_RESPONSE
    }

    /// Whether this body is an error payload (see [`crate::errors`]).
    pub fn is_error(&self) -> bool {
        self.message_type == crate::errors::TYPE_ERROR
    }
}

/// Chained builder for [`MessageBody`].
#[derive(Debug)]
pub struct MessageBodyBuilder {
    message_type: String,
    attributes: HashMap<String, Value>,
}

impl MessageBodyBuilder {
    /// Adds one attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds all attributes from the iterator.
    pub fn attributes(
        mut self,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn build(self) -> MessageBody {
        MessageBody {
            message_type: self.message_type,
            attributes: self.attributes,
        }
    }
}
