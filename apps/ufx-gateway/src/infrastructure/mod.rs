//! Infrastructure layer.

pub mod config;
pub mod telemetry;
pub mod ufx;
