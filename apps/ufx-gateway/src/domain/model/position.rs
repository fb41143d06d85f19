//! Position snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::Exchange;
use super::symbol::Symbol;

/// Pass-through position snapshot from a holdings query reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Security code.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Current holding volume.
    pub volume: u64,
    /// Average cost price.
    pub price: Decimal,
    /// Frozen volume.
    pub frozen: u64,
    /// Volume available to trade.
    pub available: u64,
    /// Accumulated profit and loss.
    pub pnl: Decimal,
}
