//! Trade (fill) record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::{LocalOrderId, TradeId};
use super::market::{Direction, Exchange};
use super::symbol::Symbol;

/// One fill reported by the venue.
///
/// Immutable once created; the reconciliation engine guarantees each trade
/// id is applied at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Venue-assigned trade id.
    pub trade_id: TradeId,
    /// Owning order's local id.
    pub order_id: LocalOrderId,
    /// Security code.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Fill direction.
    pub direction: Direction,
    /// Fill price.
    pub price: Decimal,
    /// Fill volume.
    pub volume: u64,
    /// Fill timestamp.
    pub timestamp: DateTime<Utc>,
}
