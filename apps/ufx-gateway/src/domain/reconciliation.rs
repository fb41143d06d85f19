//! Order/trade reconciliation book.
//!
//! Owns the canonical order table, the venue-id index, the trade
//! de-duplication set and the contract cache, and applies the merge rules
//! that keep them consistent across the three unordered update sources
//! (query replies, pushes, and the login sweep).
//!
//! Per-order merge decisions live on [`Order`]; this book adds the
//! cross-order bookkeeping: resolving venue ids back to local ids and
//! gating each trade id so it is applied at most once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::model::{
    Contract, LocalOrderId, Order, OrderSnapshot, OrderStatus, Symbol, Trade, TradeId,
    VenueOrderId,
};

/// Which of the update sources produced a row.
///
/// Queries are pulled on demand against the venue's system of record and
/// always overwrite status; pushes are best-effort notifications guarded by
/// terminal stickiness and the stale-volume check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// A query reply (authoritative snapshot).
    Query,
    /// A push notification (best effort).
    Push,
}

/// One fill to apply to an order's running traded volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillRecord {
    /// Venue-assigned trade id (the de-duplication key).
    pub trade_id: TradeId,
    /// Fill price.
    pub price: Decimal,
    /// Fill volume.
    pub volume: u64,
    /// Fill timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Result of applying a fill through the de-duplication gate.
#[derive(Debug, Clone)]
pub enum FillOutcome {
    /// The fill was applied: a new trade was created and the owning order's
    /// traded volume advanced.
    Applied {
        /// The newly created trade record.
        trade: Box<Trade>,
        /// The owning order after the fill.
        order: Box<Order>,
    },
    /// The trade id was already seen; nothing changed.
    Duplicate,
    /// The fill arrived by push while the owning order is terminal; it was
    /// dropped. The de-duplication set is left untouched so an
    /// authoritative trade query can still deliver it.
    DiscardedTerminal,
    /// The owning order is not known. The de-duplication set is left
    /// untouched so a later sweep can re-deliver the fill once the order
    /// query has registered the venue id.
    UnknownOrder,
}

/// Canonical state shared by every reply handler.
#[derive(Debug, Default)]
pub struct ReconciliationBook {
    orders: HashMap<LocalOrderId, Order>,
    venue_index: HashMap<VenueOrderId, LocalOrderId>,
    trade_ids: HashSet<TradeId>,
    contracts: HashMap<Symbol, Contract>,
}

impl ReconciliationBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the optimistic local record for a just-issued send.
    ///
    /// Returns a clone of the stored order for event emission.
    pub fn insert_submitted(&mut self, order: Order) -> Order {
        let local_id = order.local_id().clone();
        self.orders.insert(local_id, order.clone());
        order
    }

    /// Merge an order row from a query reply or a push.
    ///
    /// An unknown local id is inserted as given; a known order goes through
    /// the source-dependent merge on [`Order`]. Returns a clone of the order
    /// when the row changed it, `None` when it was discarded.
    pub fn apply_snapshot(
        &mut self,
        snapshot: OrderSnapshot,
        source: UpdateSource,
    ) -> Option<Order> {
        if let Some(venue_id) = &snapshot.venue_id {
            self.venue_index
                .insert(venue_id.clone(), snapshot.local_id.clone());
        }

        if let Some(order) = self.orders.get_mut(&snapshot.local_id) {
            let outcome = match source {
                UpdateSource::Query => order.merge_query(&snapshot),
                UpdateSource::Push => order.merge_push(&snapshot),
            };
            if outcome.is_applied() {
                return Some(order.clone());
            }
            tracing::debug!(
                order_id = %snapshot.local_id,
                status = %snapshot.status,
                traded = snapshot.traded,
                outcome = ?outcome,
                "Discarded order update"
            );
            return None;
        }

        let order = Order::from_snapshot(snapshot);
        Some(self.insert_submitted(order))
    }

    /// Apply a fill to its owning order through the de-duplication gate.
    ///
    /// The owner is resolved first so an unknown owner leaves the gate
    /// untouched. Pushed fills are terminal-guarded like any push: a fill
    /// push against a terminal order is dropped without consuming its
    /// trade id, so the counter of a closed order never moves on push
    /// evidence alone; query-sourced fills stay authoritative. Past those
    /// guards the trade-id insertion is the gate and duplicates are
    /// silently ignored (trade pushes and trade queries overlap in the
    /// venue protocol).
    pub fn apply_fill(
        &mut self,
        owner: &LocalOrderId,
        fill: FillRecord,
        source: UpdateSource,
    ) -> FillOutcome {
        let Some(order) = self.orders.get_mut(owner) else {
            return FillOutcome::UnknownOrder;
        };

        if source == UpdateSource::Push && order.status().is_terminal() {
            return FillOutcome::DiscardedTerminal;
        }

        if !self.trade_ids.insert(fill.trade_id.clone()) {
            return FillOutcome::Duplicate;
        }

        let clipped = order.apply_fill(fill.volume);
        if clipped {
            tracing::warn!(
                order_id = %owner,
                volume = order.volume(),
                "Fill sum exceeds requested volume; traded clamped"
            );
        }

        let trade = Trade {
            trade_id: fill.trade_id,
            order_id: owner.clone(),
            symbol: order.symbol().clone(),
            exchange: order.exchange(),
            direction: order.direction(),
            price: fill.price,
            volume: fill.volume,
            timestamp: fill.timestamp,
        };

        FillOutcome::Applied {
            trade: Box::new(trade),
            order: Box::new(order.clone()),
        }
    }

    /// Apply the status carried alongside a trade push row.
    ///
    /// Terminal-guarded; traded volume untouched. Returns the order when the
    /// status changed.
    pub fn apply_push_status(
        &mut self,
        local_id: &LocalOrderId,
        status: OrderStatus,
    ) -> Option<Order> {
        let order = self.orders.get_mut(local_id)?;
        order.apply_push_status(status).then(|| order.clone())
    }

    /// Record the venue id learned from a send acknowledgement.
    pub fn learn_venue_id(&mut self, local_id: &LocalOrderId, venue_id: VenueOrderId) {
        self.venue_index.insert(venue_id.clone(), local_id.clone());
        if let Some(order) = self.orders.get_mut(local_id) {
            order.learn_venue_id(venue_id);
        }
    }

    /// Force an order to `Rejected` (send reply carried a venue error).
    pub fn reject(&mut self, local_id: &LocalOrderId) -> Option<Order> {
        let order = self.orders.get_mut(local_id)?;
        order.reject();
        Some(order.clone())
    }

    /// Force an order to `Cancelled` (cancel reply without an error code).
    pub fn force_cancelled(&mut self, venue_id: &VenueOrderId) -> Option<Order> {
        let local_id = self.venue_index.get(venue_id)?.clone();
        let order = self.orders.get_mut(&local_id)?;
        order.force_cancelled();
        Some(order.clone())
    }

    /// Resolve a venue order id back to the local id that owns it.
    #[must_use]
    pub fn resolve_venue(&self, venue_id: &VenueOrderId) -> Option<&LocalOrderId> {
        self.venue_index.get(venue_id)
    }

    /// Look up an order by local id.
    #[must_use]
    pub fn order(&self, local_id: &LocalOrderId) -> Option<&Order> {
        self.orders.get(local_id)
    }

    /// Number of orders in the table.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Cache one contract from the login sweep.
    pub fn insert_contract(&mut self, contract: Contract) {
        self.contracts.insert(contract.symbol.clone(), contract);
    }

    /// Look up cached contract metadata by symbol.
    #[must_use]
    pub fn contract(&self, symbol: &Symbol) -> Option<&Contract> {
        self.contracts.get(symbol)
    }

    /// Number of cached contracts.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }
}
