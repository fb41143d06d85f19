//! Typed views over decoded UFX rows.
//!
//! The codec hands over string maps; this module is where typed
//! interpretation happens: venue enumeration codes, decimal amounts and
//! Beijing-local timestamps become canonical domain values. A malformed
//! row is a protocol anomaly (logged and dropped by the caller), never a
//! session-fatal condition.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::model::{
    AccountSnapshot, Contract, Direction, Exchange, LocalOrderId, OrderKind, OrderSnapshot,
    OrderStatus, PositionSnapshot, Symbol, TradeId, VenueOrderId,
};
use crate::domain::reconciliation::FillRecord;
use crate::infrastructure::ufx::protocol;

use super::codec::Row;

/// Row-level parse errors.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// A field the row class requires is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field value does not parse as the expected type.
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Offending string value.
        value: String,
    },
}

/// A business error reported in a reply's first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueError {
    /// Venue error code (`error_no`).
    pub code: String,
    /// Venue error text (`error_info`).
    pub message: String,
}

impl std::fmt::Display for VenueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error {}: {}", self.code, self.message)
    }
}

/// Extract the venue business error from a reply, if any.
///
/// The venue signals failure with a non-empty, non-zero `error_no` in the
/// first row; `error_info` carries its own error text. An absent field or
/// `"0"` means success.
#[must_use]
pub fn venue_error(rows: &[Row]) -> Option<VenueError> {
    let first = rows.first()?;
    let code = first.get("error_no")?;
    if code.is_empty() || code == "0" {
        return None;
    }
    Some(VenueError {
        code: code.clone(),
        message: first.get("error_info").cloned().unwrap_or_default(),
    })
}

/// The three session fields a successful login must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    /// Venue-assigned client id.
    pub client_id: String,
    /// Venue-assigned session number.
    pub session_no: String,
    /// Authentication token for subsequent requests.
    pub user_token: String,
}

impl LoginReply {
    /// Parse the login reply. All three fields must be present and
    /// non-empty or the login is treated as failed, even without an
    /// explicit error code.
    #[must_use]
    pub fn from_rows(rows: &[Row]) -> Option<Self> {
        let row = rows.last()?;
        let client_id = row.get("client_id")?;
        let session_no = row.get("session_no")?;
        let user_token = row.get("user_token")?;
        if client_id.is_empty() || session_no.is_empty() || user_token.is_empty() {
            return None;
        }
        Some(Self {
            client_id: client_id.clone(),
            session_no: session_no.clone(),
            user_token: user_token.clone(),
        })
    }
}

fn require<'a>(row: &'a Row, field: &'static str) -> Result<&'a str, MessageError> {
    row.get(field)
        .map(String::as_str)
        .ok_or(MessageError::MissingField(field))
}

fn optional<'a>(row: &'a Row, field: &str) -> &'a str {
    row.get(field).map_or("", String::as_str)
}

/// Map a venue `exchange_type` code.
pub fn parse_exchange(code: &str) -> Result<Exchange, MessageError> {
    match code {
        protocol::EXCHANGE_SSE => Ok(Exchange::Sse),
        protocol::EXCHANGE_SZSE => Ok(Exchange::Szse),
        other => Err(MessageError::InvalidValue {
            field: "exchange_type",
            value: other.to_string(),
        }),
    }
}

/// Venue `exchange_type` code for an exchange.
#[must_use]
pub const fn exchange_code(exchange: Exchange) -> &'static str {
    match exchange {
        Exchange::Sse => protocol::EXCHANGE_SSE,
        Exchange::Szse => protocol::EXCHANGE_SZSE,
    }
}

/// Map a venue `entrust_bs` code.
pub fn parse_direction(code: &str) -> Result<Direction, MessageError> {
    match code {
        protocol::DIRECTION_BUY => Ok(Direction::Buy),
        protocol::DIRECTION_SELL => Ok(Direction::Sell),
        other => Err(MessageError::InvalidValue {
            field: "entrust_bs",
            value: other.to_string(),
        }),
    }
}

/// Venue `entrust_bs` code for a direction.
#[must_use]
pub const fn direction_code(direction: Direction) -> &'static str {
    match direction {
        Direction::Buy => protocol::DIRECTION_BUY,
        Direction::Sell => protocol::DIRECTION_SELL,
    }
}

/// Map a venue `entrust_prop` code.
pub fn parse_kind(code: &str) -> Result<OrderKind, MessageError> {
    match code {
        protocol::KIND_LIMIT => Ok(OrderKind::Limit),
        protocol::KIND_MARKET => Ok(OrderKind::Market),
        other => Err(MessageError::InvalidValue {
            field: "entrust_prop",
            value: other.to_string(),
        }),
    }
}

/// Venue `entrust_prop` code for an order kind.
#[must_use]
pub const fn kind_code(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Limit => protocol::KIND_LIMIT,
        OrderKind::Market => protocol::KIND_MARKET,
    }
}

/// Map a venue `entrust_status` code onto the canonical status domain.
///
/// Fail-open: an unrecognized code maps to `Submitting` so an unknown
/// status never drops an order from view.
#[must_use]
pub fn parse_status(code: &str) -> OrderStatus {
    match code {
        "2" | "3" => OrderStatus::NotTraded,
        "4" | "7" => OrderStatus::PartTraded,
        "5" | "6" => OrderStatus::Cancelled,
        "8" => OrderStatus::AllTraded,
        "9" => OrderStatus::Rejected,
        _ => OrderStatus::Submitting,
    }
}

/// Parse a venue volume field: an integral share count the venue may
/// format with a fractional tail (`"300"` or `"300.0"`).
fn parse_volume(field: &'static str, value: &str) -> Result<u64, MessageError> {
    let invalid = || MessageError::InvalidValue {
        field,
        value: value.to_string(),
    };
    let decimal: Decimal = value.trim().parse().map_err(|_| invalid())?;
    decimal.trunc().to_u64().ok_or_else(invalid)
}

fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, MessageError> {
    value.trim().parse().map_err(|_| MessageError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// Parse a venue `YYYYMMDD` date plus `HHMMSS` time into UTC.
///
/// Every timestamp the venue reports is Beijing local time (+08:00).
/// Short time strings are zero-padded on the left the way the venue pads
/// them (`"93015"` is 09:30:15).
pub fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, MessageError> {
    let padded = format!("{time:0>6}");
    let seconds = padded.get(..6).unwrap_or(&padded);
    let composite = format!("{date} {seconds} +0800");
    DateTime::parse_from_str(&composite, "%Y%m%d %H%M%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MessageError::InvalidValue {
            field: "timestamp",
            value: composite,
        })
}

/// Parse an order row from an order query reply (`333101`).
///
/// The local id is the echoed `entrust_reference`; rows with a zero
/// `report_time` never reached the venue book and are skipped upstream.
pub fn parse_order_query_row(row: &Row) -> Result<OrderSnapshot, MessageError> {
    let timestamp = parse_timestamp(require(row, "init_date")?, require(row, "report_time")?)?;
    parse_order_fields(row, timestamp)
}

/// Parse an order row from the combined push channel (`620003`).
///
/// Push rows carry a millisecond `report_time` and no date; the venue's
/// trading day is today in Beijing time.
pub fn parse_order_push_row(row: &Row, now: DateTime<Utc>) -> Result<OrderSnapshot, MessageError> {
    let report_time = require(row, "report_time")?;
    let seconds = report_time
        .len()
        .checked_sub(3)
        .and_then(|cut| report_time.get(..cut))
        .unwrap_or("0");
    // The venue's trading day is today in Beijing local time.
    let date = (now.naive_utc() + TimeDelta::hours(8))
        .format("%Y%m%d")
        .to_string();
    let timestamp = parse_timestamp(&date, seconds)?;
    parse_order_fields(row, timestamp)
}

fn parse_order_fields(row: &Row, timestamp: DateTime<Utc>) -> Result<OrderSnapshot, MessageError> {
    let venue_id = match optional(row, "entrust_no") {
        "" => None,
        id => Some(VenueOrderId::new(id)),
    };
    Ok(OrderSnapshot {
        local_id: LocalOrderId::new(require(row, "entrust_reference")?),
        venue_id,
        symbol: Symbol::new(require(row, "stock_code")?),
        exchange: parse_exchange(require(row, "exchange_type")?)?,
        direction: parse_direction(require(row, "entrust_bs")?)?,
        kind: parse_kind(require(row, "entrust_prop")?)?,
        price: parse_decimal("entrust_price", require(row, "entrust_price")?)?,
        volume: parse_volume("entrust_amount", require(row, "entrust_amount")?)?,
        traded: parse_volume("business_amount", require(row, "business_amount")?)?,
        status: parse_status(require(row, "entrust_status")?),
        timestamp,
    })
}

/// Whether an order push row is the venue's cancel-request echo rather
/// than an order state change.
#[must_use]
pub fn is_cancel_echo(row: &Row) -> bool {
    optional(row, "entrust_type") == protocol::ENTRUST_TYPE_CANCEL
}

/// Whether a trade row is a cancellation record rather than a fill.
#[must_use]
pub fn is_cancel_record(row: &Row) -> bool {
    optional(row, "real_type") == protocol::REAL_TYPE_CANCEL
        || optional(row, "real_status") == protocol::REAL_TYPE_CANCEL
}

/// A trade row from either the trade query or the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRow {
    /// The owning order's venue id (`entrust_no`), when carried.
    pub venue_id: Option<VenueOrderId>,
    /// The owning order's local id (`entrust_reference`), when carried.
    pub local_id: Option<LocalOrderId>,
    /// The fill, ready for the de-duplication gate.
    pub fill: FillRecord,
}

/// Parse a trade row from a trade query reply (`333102`).
pub fn parse_trade_query_row(row: &Row) -> Result<TradeRow, MessageError> {
    let timestamp = parse_timestamp(require(row, "date")?, require(row, "business_time")?)?;
    parse_trade_fields(row, timestamp)
}

/// Parse a trade row from the combined push channel (`620003`).
pub fn parse_trade_push_row(row: &Row) -> Result<TradeRow, MessageError> {
    let timestamp = parse_timestamp(require(row, "init_date")?, require(row, "business_time")?)?;
    parse_trade_fields(row, timestamp)
}

fn parse_trade_fields(row: &Row, timestamp: DateTime<Utc>) -> Result<TradeRow, MessageError> {
    let venue_id = match optional(row, "entrust_no") {
        "" => None,
        id => Some(VenueOrderId::new(id)),
    };
    let local_id = match optional(row, "entrust_reference") {
        "" => None,
        id => Some(LocalOrderId::new(id)),
    };
    Ok(TradeRow {
        venue_id,
        local_id,
        fill: FillRecord {
            trade_id: TradeId::new(require(row, "business_id")?),
            price: parse_decimal("business_price", require(row, "business_price")?)?,
            volume: parse_volume("business_amount", require(row, "business_amount")?)?,
            timestamp,
        },
    })
}

/// Parse a contract row from the contract query sweep (`330300`).
pub fn parse_contract_row(row: &Row) -> Result<Contract, MessageError> {
    Ok(Contract {
        symbol: Symbol::new(require(row, "stock_code")?),
        exchange: parse_exchange(require(row, "exchange_type")?)?,
        name: require(row, "stock_name")?.to_string(),
        lot_size: parse_volume("store_unit", require(row, "store_unit")?)?,
        price_tick: parse_decimal("price_step", require(row, "price_step")?)?,
        min_volume: parse_volume("buy_unit", require(row, "buy_unit")?)?,
    })
}

/// Parse an account row from a funds query reply (`332255`).
pub fn parse_account_row(row: &Row, account_id: &str) -> Result<AccountSnapshot, MessageError> {
    Ok(AccountSnapshot {
        account_id: account_id.to_string(),
        balance: parse_decimal("current_balance", require(row, "current_balance")?)?,
        frozen: parse_decimal("frozen_balance", require(row, "frozen_balance")?)?,
    })
}

/// Parse a position row from a holdings query reply (`333104`).
pub fn parse_position_row(row: &Row) -> Result<PositionSnapshot, MessageError> {
    Ok(PositionSnapshot {
        symbol: Symbol::new(require(row, "stock_code")?),
        exchange: parse_exchange(require(row, "exchange_type")?)?,
        volume: parse_volume("current_amount", require(row, "current_amount")?)?,
        price: parse_decimal("av_cost_price", require(row, "av_cost_price")?)?,
        frozen: parse_volume("frozen_amount", require(row, "frozen_amount")?)?,
        available: parse_volume("enable_amount", require(row, "enable_amount")?)?,
        pnl: parse_decimal("income_balance", require(row, "income_balance")?)?,
    })
}
