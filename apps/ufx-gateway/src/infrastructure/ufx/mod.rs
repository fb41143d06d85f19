//! UFX venue adapter.
//!
//! Everything that knows the venue's wire vocabulary lives here: the
//! string-table codec, the function-code constants, the typed row parsers,
//! the request/reply correlation table, the session state machine, and the
//! client that ties them together.

pub mod client;
pub mod codec;
pub mod correlation;
pub mod messages;
pub mod protocol;
pub mod session;

pub use client::{GatewayError, UfxClient};
