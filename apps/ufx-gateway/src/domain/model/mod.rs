//! Canonical order/trade model.

mod account;
mod contract;
mod identifiers;
mod market;
mod order;
mod order_status;
mod position;
mod symbol;
mod trade;

pub use account::AccountSnapshot;
pub use contract::Contract;
pub use identifiers::{LocalOrderId, RequestId, TradeId, VenueOrderId};
pub use market::{Direction, Exchange, OrderKind};
pub use order::{MergeOutcome, Order, OrderRequest, OrderSnapshot};
pub use order_status::OrderStatus;
pub use position::PositionSnapshot;
pub use symbol::Symbol;
pub use trade::Trade;
