//! Order aggregate.
//!
//! The canonical view of one order, merged from three unordered sources:
//! synchronous request replies, asynchronous pushes, and periodic query
//! sweeps. All merge decisions that concern a single order live here; the
//! cross-order bookkeeping (venue-id index, trade de-duplication) lives in
//! [`crate::domain::reconciliation`].
//!
//! Two invariants hold across any sequence of applied updates:
//! - cumulative traded volume never decreases and never exceeds the
//!   requested volume;
//! - a terminal status is sticky against pushes (query snapshots stay
//!   authoritative for status).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::{LocalOrderId, VenueOrderId};
use super::market::{Direction, Exchange, OrderKind};
use super::order_status::OrderStatus;
use super::symbol::Symbol;

/// Point-in-time order state carried by a single venue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    /// Client-assigned order id echoed by the venue.
    pub local_id: LocalOrderId,
    /// Venue-assigned order id, when the row carries one.
    pub venue_id: Option<VenueOrderId>,
    /// Security code.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Order direction.
    pub direction: Direction,
    /// Order pricing kind.
    pub kind: OrderKind,
    /// Limit price (zero for market orders).
    pub price: Decimal,
    /// Requested volume.
    pub volume: u64,
    /// Cumulative traded volume reported by the row.
    pub traded: u64,
    /// Status reported by the row.
    pub status: OrderStatus,
    /// Row timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Result of merging an incoming update into a known order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The update was applied.
    Applied,
    /// Discarded: the order is terminal and the update came from a push.
    DiscardedTerminal,
    /// Discarded whole: the push carried a traded volume below the one
    /// already known, which marks it as stale evidence.
    DiscardedStale,
}

impl MergeOutcome {
    /// Whether the update mutated the order.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Request to place a new order at the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Security code.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Order direction.
    pub direction: Direction,
    /// Order pricing kind.
    pub kind: OrderKind,
    /// Limit price (ignored by the venue for market orders).
    pub price: Decimal,
    /// Requested volume.
    pub volume: u64,
}

/// Canonical order record.
///
/// Created optimistically the instant a send is issued and retained for the
/// session lifetime (never deleted), so stale pushes can always be checked
/// against the last known state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    local_id: LocalOrderId,
    venue_id: Option<VenueOrderId>,
    symbol: Symbol,
    exchange: Exchange,
    direction: Direction,
    kind: OrderKind,
    price: Decimal,
    volume: u64,
    traded: u64,
    /// Sum of de-duplicated fills. Kept separately from `traded` so that a
    /// snapshot that already includes a fill and the later re-delivery of
    /// that fill through a trade query merge to the same value regardless
    /// of arrival order: `traded` is the running maximum of both.
    fill_volume: u64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Create the optimistic local record for a just-issued send.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn submitted(
        local_id: LocalOrderId,
        symbol: Symbol,
        exchange: Exchange,
        direction: Direction,
        kind: OrderKind,
        price: Decimal,
        volume: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id,
            venue_id: None,
            symbol,
            exchange,
            direction,
            kind,
            price,
            volume,
            traded: 0,
            fill_volume: 0,
            status: OrderStatus::Submitting,
            created_at,
        }
    }

    /// Create an order from a venue row for a local id not seen before.
    #[must_use]
    pub fn from_snapshot(snapshot: OrderSnapshot) -> Self {
        let traded = snapshot.traded.min(snapshot.volume);
        Self {
            local_id: snapshot.local_id,
            venue_id: snapshot.venue_id,
            symbol: snapshot.symbol,
            exchange: snapshot.exchange,
            direction: snapshot.direction,
            kind: snapshot.kind,
            price: snapshot.price,
            volume: snapshot.volume,
            traded,
            fill_volume: 0,
            status: snapshot.status,
            created_at: snapshot.timestamp,
        }
    }

    /// Merge a push row into this order.
    ///
    /// Pushes are best-effort notifications: they are discarded when the
    /// order is already terminal, and discarded whole when their traded
    /// volume would decrease the known one. A stale replay cannot change
    /// status either; both fields stay untouched.
    pub fn merge_push(&mut self, snapshot: &OrderSnapshot) -> MergeOutcome {
        if self.status.is_terminal() {
            return MergeOutcome::DiscardedTerminal;
        }
        if snapshot.traded < self.traded {
            return MergeOutcome::DiscardedStale;
        }
        self.apply_snapshot(snapshot);
        MergeOutcome::Applied
    }

    /// Merge a query-reply row into this order.
    ///
    /// Queries are authoritative snapshots of the venue's system of record:
    /// status always overwrites, traded volume still only merges upward.
    pub fn merge_query(&mut self, snapshot: &OrderSnapshot) -> MergeOutcome {
        self.apply_snapshot(snapshot);
        MergeOutcome::Applied
    }

    fn apply_snapshot(&mut self, snapshot: &OrderSnapshot) {
        self.status = snapshot.status;
        self.raise_traded(snapshot.traded);
        if let Some(venue_id) = &snapshot.venue_id {
            self.learn_venue_id(venue_id.clone());
        }
    }

    /// Apply a de-duplicated fill to the running traded-volume counter.
    ///
    /// Returns `true` if the counter was clipped at the requested volume.
    pub fn apply_fill(&mut self, fill: u64) -> bool {
        self.fill_volume = self.fill_volume.saturating_add(fill);
        self.raise_traded(self.fill_volume);
        self.fill_volume > self.volume
    }

    /// Apply the status carried alongside a trade push row.
    ///
    /// Terminal-guarded like any push; traded volume is untouched. Returns
    /// `true` when the status changed.
    pub fn apply_push_status(&mut self, status: OrderStatus) -> bool {
        if self.status.is_terminal() || self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    /// Force the order to `Cancelled` (cancel reply without an error code).
    pub fn force_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
    }

    /// Force the order to `Rejected` (send reply carrying an error code).
    pub fn reject(&mut self) {
        self.status = OrderStatus::Rejected;
    }

    /// Record the venue-assigned id. Returns `true` if it was newly learned.
    pub fn learn_venue_id(&mut self, venue_id: VenueOrderId) -> bool {
        if self.venue_id.is_some() {
            return false;
        }
        self.venue_id = Some(venue_id);
        true
    }

    /// Raise `traded` monotonically, clamped at the requested volume.
    fn raise_traded(&mut self, candidate: u64) {
        self.traded = self.traded.max(candidate.min(self.volume));
    }

    /// Client-assigned order id.
    #[must_use]
    pub const fn local_id(&self) -> &LocalOrderId {
        &self.local_id
    }

    /// Venue-assigned order id, if learned.
    #[must_use]
    pub const fn venue_id(&self) -> Option<&VenueOrderId> {
        self.venue_id.as_ref()
    }

    /// Security code.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Listing exchange.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Order direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Order pricing kind.
    #[must_use]
    pub const fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Limit price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Requested volume.
    #[must_use]
    pub const fn volume(&self) -> u64 {
        self.volume
    }

    /// Cumulative traded volume.
    #[must_use]
    pub const fn traded(&self) -> u64 {
        self.traded
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
