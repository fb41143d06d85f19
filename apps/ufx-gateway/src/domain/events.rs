//! Events emitted toward the gateway's consumer.

use super::model::{AccountSnapshot, Contract, Order, PositionSnapshot, Trade};

/// Event published on the gateway's consumer channel.
///
/// `OrderUpdated` and `TradeCreated` carry the reconciliation guarantees
/// (monotone fills, terminal stickiness, trade de-duplication); the
/// remaining variants are pass-through snapshots.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Canonical state of an order changed.
    OrderUpdated(Box<Order>),
    /// A new, de-duplicated fill was applied.
    TradeCreated(Box<Trade>),
    /// Account balances snapshot.
    AccountUpdated(AccountSnapshot),
    /// Position snapshot.
    PositionUpdated(PositionSnapshot),
    /// Contract metadata discovered by the login sweep.
    ContractUpdated(Box<Contract>),
    /// Human-readable gateway log line for the consumer's UI.
    LogMessage(String),
}
