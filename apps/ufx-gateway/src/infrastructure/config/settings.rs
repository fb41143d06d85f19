//! Gateway Configuration Settings
//!
//! Configuration for the venue session, loaded from environment variables
//! with the `UFX_` prefix.

use std::time::Duration;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable does not parse as the expected type.
    #[error("environment variable {variable} has invalid value `{value}`")]
    InvalidValue {
        /// Variable name.
        variable: String,
        /// Offending value.
        value: String,
    },
}

/// Trading password, redacted in Debug output.
#[derive(Clone)]
pub struct Credential {
    password: String,
}

impl Credential {
    /// Wrap a password.
    #[must_use]
    pub const fn new(password: String) -> Self {
        Self { password }
    }

    /// Get the password for request construction.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Branch number of the account (`branch_no`).
    pub branch_no: i32,
    /// Order-entry channel code (`op_entrust_way`).
    pub entrust_way: String,
    /// Terminal station string (`op_station`).
    pub station: String,
    /// Fund account.
    pub account: String,
    /// Trading password.
    pub credential: Credential,
    /// Primary server endpoint.
    pub primary_server: String,
    /// Optional backup server endpoint.
    pub backup_server: Option<String>,
    /// Poll scheduler cadence in ticks.
    pub poll_cadence: u32,
    /// External timer interval for the poll helper.
    pub poll_interval: Duration,
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, empty, or does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a key lookup function.
    ///
    /// `from_env` is this with `std::env::var`; tests supply a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let branch_no = require(&lookup, "UFX_BRANCH_NO")?;
        let branch_no: i32 = branch_no
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                variable: "UFX_BRANCH_NO".to_string(),
                value: branch_no,
            })?;

        let account = require(&lookup, "UFX_ACCOUNT")?;
        let password = require(&lookup, "UFX_PASSWORD")?;
        let primary_server = require(&lookup, "UFX_PRIMARY_SERVER")?;

        let entrust_way = lookup("UFX_ENTRUST_WAY").unwrap_or_else(|| "7".to_string());
        let station = lookup("UFX_STATION").unwrap_or_default();
        let backup_server = lookup("UFX_BACKUP_SERVER").filter(|s| !s.is_empty());

        let poll_cadence = parse_or_default(&lookup, "UFX_POLL_CADENCE", 2)?;
        let poll_interval_secs: u64 = parse_or_default(&lookup, "UFX_POLL_INTERVAL_SECS", 1)?;

        Ok(Self {
            branch_no,
            entrust_way,
            station,
            account,
            credential: Credential::new(password),
            primary_server,
            backup_server,
            poll_cadence,
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }

    /// The server list handed to the transport: `primary` or
    /// `primary;backup` when a backup endpoint is configured.
    #[must_use]
    pub fn servers(&self) -> String {
        match &self.backup_server {
            Some(backup) => format!("{};{}", self.primary_server, backup),
            None => self.primary_server.clone(),
        }
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            variable: key.to_string(),
            value,
        }),
    }
}
