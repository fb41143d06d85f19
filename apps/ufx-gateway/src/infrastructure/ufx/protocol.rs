//! UFX function codes and field vocabulary.

/// User login.
pub const FUNCTION_USER_LOGIN: u32 = 331_100;
/// Contract metadata query (one per exchange).
pub const FUNCTION_QUERY_CONTRACT: u32 = 330_300;
/// Order query.
pub const FUNCTION_QUERY_ORDER: u32 = 333_101;
/// Trade query.
pub const FUNCTION_QUERY_TRADE: u32 = 333_102;
/// Account balance query.
pub const FUNCTION_QUERY_ACCOUNT: u32 = 332_255;
/// Position query.
pub const FUNCTION_QUERY_POSITION: u32 = 333_104;
/// Order entry.
pub const FUNCTION_SEND_ORDER: u32 = 333_002;
/// Order cancellation.
pub const FUNCTION_CANCEL_ORDER: u32 = 333_017;
/// Connection heartbeat; answered inline, never dispatched.
pub const FUNCTION_HEARTBEAT: u32 = 620_000;
/// Push-channel subscription.
pub const FUNCTION_SUBSCRIBE: u32 = 620_001;
/// Combined order/trade push channel.
pub const FUNCTION_PUSH: u32 = 620_003;

/// Trade push-channel subscription type.
pub const ISSUE_TYPE_TRADE: &str = "12";
/// Order push-channel subscription type.
pub const ISSUE_TYPE_ORDER: &str = "23";

/// Venue code for the Shanghai Stock Exchange.
pub const EXCHANGE_SSE: &str = "1";
/// Venue code for the Shenzhen Stock Exchange.
pub const EXCHANGE_SZSE: &str = "2";

/// Venue code for a buy order.
pub const DIRECTION_BUY: &str = "1";
/// Venue code for a sell order.
pub const DIRECTION_SELL: &str = "2";

/// Venue code for a limit order.
pub const KIND_LIMIT: &str = "0";
/// Venue code for a market order.
pub const KIND_MARKET: &str = "U";

/// `entrust_type` value marking an order push row as a cancel echo.
pub const ENTRUST_TYPE_CANCEL: &str = "2";
/// `real_type`/`real_status` value marking a trade row as a cancellation
/// record rather than a fill.
pub const REAL_TYPE_CANCEL: &str = "2";
