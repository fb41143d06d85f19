//! Application layer.
//!
//! Port definitions for the external capabilities the gateway depends on,
//! plus the poll scheduler that drives the low-priority query sweep.

pub mod ports;
pub mod services;
