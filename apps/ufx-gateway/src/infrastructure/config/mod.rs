//! Configuration module.

mod settings;

pub use settings::{ConfigError, Credential, GatewayConfig};
