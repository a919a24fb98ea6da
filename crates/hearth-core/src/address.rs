//! Addressing model for the Hearth platform bus.
//!
//! Every endpoint on the bus is identified by an [`Address`]: a namespace,
//! an owning group within that namespace, and optionally an instance id with
//! a qualifier. Three shapes matter to dispatch:
//!
//! - **Broadcast** — no group, no id. Delivered to every subscriber.
//! - **Service address** — namespace + group only. Identifies the service
//!   that owns a group of instances (e.g. `SERV:scheduler:`).
//! - **Instance address** — namespace + group + id. Identifies one stateful
//!   entity owned by a service (e.g. `SERV:scheduler:5de1...`).
//!
//! # Text representation
//!
//! Addresses render as `namespace:group:id`, with the trailing id omitted
//! for service addresses (`namespace:group:`) and the whole string empty for
//! broadcast. A qualified instance renders as `namespace:group:id.qualifier`.
//! Parsing is strict: malformed strings fail with [`AddressParseError`]
//! instead of producing a half-formed address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressParseError;

/// Namespace for platform services (`SERV:rule:`, `SERV:scheduler:`...).
pub const NAMESPACE_SERVICE: &str = "SERV";
/// Namespace for device drivers.
pub const NAMESPACE_DRIVER: &str = "DRIV";
/// Namespace for hubs.
pub const NAMESPACE_HUB: &str = "HUB";
/// Namespace for connected clients.
pub const NAMESPACE_CLIENT: &str = "CLNT";

/// Service group owned by the hub itself. Requests routed here are handled
/// by hub firmware rather than a platform service, so the service router
/// never synthesizes errors for it.
pub const HUB_SERVICE_GROUP: &str = "hub";

/// A logical endpoint identifier on the platform bus.
///
/// Addresses are immutable value objects compared by full tuple equality.
/// Use [`Address::broadcast`], [`Address::service`] and [`Address::instance`]
/// to construct the three well-formed shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address {
    namespace: String,
    group: Option<String>,
    id: Option<String>,
    qualifier: Option<u32>,
}

impl Address {
    /// The reserved "deliver to everyone" address.
    pub fn broadcast() -> Self {
        Self {
            namespace: String::new(),
            group: None,
            id: None,
            qualifier: None,
        }
    }

    /// A service address: namespace + group, no instance id.
    pub fn service(namespace: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            group: Some(group.into()),
            id: None,
            qualifier: None,
        }
    }

    /// A platform service address in the `SERV` namespace.
    pub fn platform_service(group: impl Into<String>) -> Self {
        Self::service(NAMESPACE_SERVICE, group)
    }

    /// An instance address: namespace + group + id.
    pub fn instance(
        namespace: impl Into<String>,
        group: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group: Some(group.into()),
            id: Some(id.into()),
            qualifier: None,
        }
    }

    /// Returns this address with a context qualifier attached.
    ///
    /// Qualifiers are only meaningful on instance addresses.
    pub fn with_qualifier(mut self, qualifier: u32) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Returns the passed address, or broadcast when `None`.
    pub fn get(address: Option<&Address>) -> Address {
        address.cloned().unwrap_or_else(Address::broadcast)
    }

    /// Whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.group.is_none() && self.id.is_none()
    }

    /// Whether this address names a service rather than an instance.
    pub fn is_service(&self) -> bool {
        self.group.is_some() && self.id.is_none()
    }

    /// Whether this address targets the hub's own service group.
    pub fn is_hub_service(&self) -> bool {
        self.namespace == NAMESPACE_SERVICE && self.group.as_deref() == Some(HUB_SERVICE_GROUP)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn qualifier(&self) -> Option<u32> {
        self.qualifier
    }

    /// Normalizes this address to its owning service address, dropping any
    /// instance id and qualifier. Broadcast normalizes to itself.
    pub fn service_address(&self) -> Address {
        Self {
            namespace: self.namespace.clone(),
            group: self.group.clone(),
            id: None,
            qualifier: None,
        }
    }

    /// Classifies this address as a destination for context resolution.
    ///
    /// A service address (no instance id) is a [`DestinationKind::Static`]
    /// destination; an instance address carries its id and qualifier.
    pub fn destination_kind(&self) -> DestinationKind<'_> {
        match self.id.as_deref() {
            None => DestinationKind::Static,
            Some(id) => DestinationKind::Instance {
                id,
                qualifier: self.qualifier,
            },
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            return Ok(());
        }
        let group = self.group.as_deref().unwrap_or("");
        match (&self.id, self.qualifier) {
            (Some(id), Some(q)) => write!(f, "{}:{}:{}.{}", self.namespace, group, id, q),
            (Some(id), None) => write!(f, "{}:{}:{}", self.namespace, group, id),
            (None, _) => write!(f, "{}:{}:", self.namespace, group),
        }
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Address::broadcast());
        }
        let mut parts = s.splitn(3, ':');
        let namespace = parts.next().unwrap_or("");
        let group = parts.next();
        let id = parts.next();
        let (Some(group), Some(id)) = (group, id) else {
            return Err(AddressParseError::malformed(s));
        };
        if namespace.is_empty() || group.is_empty() {
            return Err(AddressParseError::malformed(s));
        }
        if id.is_empty() {
            return Ok(Address::service(namespace, group));
        }
        match id.split_once('.') {
            None => Ok(Address::instance(namespace, group, id)),
            Some((id, qualifier)) => {
                if id.is_empty() {
                    return Err(AddressParseError::malformed(s));
                }
                let qualifier = qualifier
                    .parse::<u32>()
                    .map_err(|_| AddressParseError::qualifier(s))?;
                Ok(Address::instance(namespace, group, id).with_qualifier(qualifier))
            }
        }
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Destination shape derived from an [`Address`], used when resolving a
/// context before a handler runs.
///
/// The original platform distinguished the two cases with a reserved
/// all-zero instance id; here the distinction is a proper variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind<'a> {
    /// Addressed to the service as a whole; no instance to resolve.
    Static,
    /// Addressed to one instance owned by the service.
    Instance {
        id: &'a str,
        qualifier: Option<u32>,
    },
}
