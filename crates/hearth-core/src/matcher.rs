//! Subscription patterns over [`Address`]es.
//!
//! An [`AddressMatcher`] is the predicate a listener hands to the bus when
//! subscribing: the bus delivers a message to the listener iff some matcher
//! accepts the message's destination. Matching is pure and total; malformed
//! pattern strings are rejected when the matcher is built, never at match
//! time.
//!
//! # Pattern syntax
//!
//! | pattern          | matcher                                   |
//! |------------------|-------------------------------------------|
//! | *(empty)*        | broadcast only                            |
//! | `SERV:rule:*`    | any id in the `SERV:rule` group           |
//! | `SERV:*:*`       | anything in the `SERV` namespace          |
//! | `SERV:rule:`     | exactly the `SERV:rule:` service address  |
//! | `SERV:rule:abc`  | exactly that instance                     |

use std::str::FromStr;

use crate::address::Address;
use crate::error::MatcherParseError;

/// A predicate over [`Address`]es, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressMatcher {
    /// Matches one address exactly (full tuple equality).
    Exact(Address),
    /// Matches every instance of a namespace + group, including the bare
    /// service address itself.
    Service { namespace: String, group: String },
    /// Matches every non-broadcast address in a namespace.
    Namespace(String),
    /// Matches only the broadcast address.
    Broadcast,
    /// Matches when any member matches.
    AnyOf(Vec<AddressMatcher>),
}

impl AddressMatcher {
    /// A matcher for every address in `namespace:group`, any id.
    pub fn service(namespace: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Service {
            namespace: namespace.into(),
            group: group.into(),
        }
    }

    /// Union of matchers; matches when any member matches.
    pub fn any_of(matchers: impl IntoIterator<Item = AddressMatcher>) -> Self {
        Self::AnyOf(matchers.into_iter().collect())
    }

    /// Tests whether this matcher accepts `address`. Pure and total.
    pub fn matches(&self, address: &Address) -> bool {
        match self {
            Self::Exact(expected) => expected == address,
            Self::Service { namespace, group } => {
                address.namespace() == namespace && address.group() == Some(group.as_str())
            }
            Self::Namespace(namespace) => {
                !address.is_broadcast() && address.namespace() == namespace
            }
            Self::Broadcast => address.is_broadcast(),
            Self::AnyOf(matchers) => matchers.iter().any(|m| m.matches(address)),
        }
    }
}

impl FromStr for AddressMatcher {
    type Err = MatcherParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::Broadcast);
        }
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        if parts.len() == 3 {
            let [namespace, group, id] = [parts[0], parts[1], parts[2]];
            if namespace.is_empty() || namespace == "*" {
                return Err(MatcherParseError::pattern(s));
            }
            match (group, id) {
                ("*", "*") => return Ok(Self::Namespace(namespace.to_string())),
                ("*", _) => return Err(MatcherParseError::pattern(s)),
                (group, "*") if !group.is_empty() => {
                    return Ok(Self::service(namespace, group));
                }
                _ => {}
            }
        }
        let address: Address = s.parse().map_err(MatcherParseError::from)?;
        Ok(Self::Exact(address))
    }
}
