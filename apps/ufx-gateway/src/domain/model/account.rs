//! Account balance snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pass-through account snapshot from a funds query reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Venue client id the balances belong to.
    pub account_id: String,
    /// Current balance.
    pub balance: Decimal,
    /// Frozen balance.
    pub frozen: Decimal,
}
