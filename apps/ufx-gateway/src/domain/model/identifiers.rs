//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up the three id spaces that coexist in the gateway:
//! client-assigned order ids, venue-assigned order ids, and venue trade ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    LocalOrderId,
    "Client-assigned order identifier, unique for the session lifetime."
);
define_id!(
    VenueOrderId,
    "Venue-assigned order identifier (`entrust_no`), learned asynchronously."
);
define_id!(
    TradeId,
    "Venue-assigned trade identifier (`business_id`), globally unique per day."
);

impl LocalOrderId {
    /// Build a local order id in the session's `{session_no}_{counter:06}`
    /// format.
    #[must_use]
    pub fn from_sequence(session_no: &str, counter: u64) -> Self {
        Self(format!("{session_no}_{counter:06}"))
    }
}

/// Request identifier returned by the transport's send primitive.
///
/// Opaque to the gateway; unique only while the request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw transport request identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
