//! Domain layer.
//!
//! The canonical order/trade model and the reconciliation rules that merge
//! venue updates into it. Nothing in this layer knows about the wire format
//! or the transport.

pub mod events;
pub mod model;
pub mod reconciliation;
