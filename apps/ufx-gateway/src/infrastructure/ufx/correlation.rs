//! Request/reply correlation.
//!
//! A send is fire-and-forget: the transport hands back an opaque request
//! id and the reply arrives later, carrying only that id and the function
//! code. This table records which business entity each outstanding request
//! refers to so the reply handler can route back to it. Entries are
//! single-use: resolution removes them, bounding the table to the set of
//! outstanding requests. Thread safety comes from the client's single
//! state lock; the table itself is plain.

use std::collections::HashMap;

use crate::domain::model::{LocalOrderId, RequestId, VenueOrderId};

/// The business entity an outstanding request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    /// An order send, keyed by the local id assigned at send time.
    Order(LocalOrderId),
    /// A cancel, keyed by the venue id so a cancel failure can be resolved
    /// back to a directed query by venue id.
    Cancel(VenueOrderId),
}

/// Map of outstanding request ids to business keys.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<RequestId, CorrelationKey>,
}

impl CorrelationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the business key for a just-issued request.
    pub fn record(&mut self, request_id: RequestId, key: CorrelationKey) {
        self.entries.insert(request_id, key);
    }

    /// Resolve and remove the entry for a reply.
    ///
    /// `None` is a protocol anomaly, not a crash: late or duplicated
    /// callbacks for already-resolved requests are expected under
    /// retry/reconnect, and the caller logs and drops the reply.
    pub fn resolve(&mut self, request_id: RequestId) -> Option<CorrelationKey> {
        self.entries.remove(&request_id)
    }

    /// Number of outstanding entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
