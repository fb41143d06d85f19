#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! UFX Gateway - Execution Gateway Client
//!
//! A client library that maintains one authenticated session to a Hundsun
//! UFX order-routing counter, translates its string-table wire messages into
//! a canonical order/trade model, and reconciles order lifecycle state across
//! three unordered information sources: synchronous request replies,
//! asynchronous push notifications, and periodic re-query sweeps.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Canonical model and the reconciliation book
//!   - `model`: Orders, trades, contracts, typed identifiers
//!   - `reconciliation`: Order table, trade de-duplication, merge rules
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interface for the venue transport capability
//!   - `services`: Round-robin poll scheduler
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `ufx`: Venue adapter (wire codec, correlation, session, client)
//!   - `config`: Environment-variable configuration
//!   - `telemetry`: Tracing subscriber initialization
//!
//! # Data Flow
//!
//! ```text
//! timer ──► PollScheduler ──► UfxClient ──► transport ──┐
//!                                                       │ (async)
//! consumer ◄── GatewayEvent ◄── ReconciliationBook ◄────┘
//!                                  ▲
//!                  CorrelationTable + wire codec
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Canonical order/trade model with no external integrations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::GatewayEvent;
pub use domain::model::{
    AccountSnapshot, Contract, Direction, Exchange, LocalOrderId, Order, OrderKind, OrderRequest,
    OrderStatus, PositionSnapshot, RequestId, Symbol, Trade, TradeId, VenueOrderId,
};
pub use domain::reconciliation::{FillOutcome, FillRecord, ReconciliationBook, UpdateSource};

// Application ports and services
pub use application::ports::{InboundFrame, SessionTransport, TransportError};
pub use application::services::{PollOperation, PollScheduler};

// Venue adapter
pub use infrastructure::ufx::{GatewayError, UfxClient, codec, protocol};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credential, GatewayConfig};
