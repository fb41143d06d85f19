//! Static contract metadata.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::Exchange;
use super::symbol::Symbol;

/// Static metadata for one listed security.
///
/// Populated by the contract query sweep at login; cached for the process
/// lifetime and only ever written by the contract-reply handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Security code.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Display name.
    pub name: String,
    /// Shares per lot.
    pub lot_size: u64,
    /// Minimum price increment.
    pub price_tick: Decimal,
    /// Minimum order volume.
    pub min_volume: u64,
}
