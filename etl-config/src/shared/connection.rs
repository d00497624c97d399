use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

const fn default_port() -> u16 {
    MySqlConnectionConfig::DEFAULT_PORT
}

const fn default_max_connections() -> u32 {
    MySqlConnectionConfig::DEFAULT_MAX_CONNECTIONS
}

const fn default_acquire_timeout_ms() -> u64 {
    MySqlConnectionConfig::DEFAULT_ACQUIRE_TIMEOUT_MS
}

/// Connection settings for the relational source.
///
/// The pool built from these settings is shared read-only by every stream extraction of a
/// run, so `max_connections` bounds how many stream queries truly execute in parallel.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking the password into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectionConfig {
    /// Host on which MySQL is running.
    pub host: String,
    /// Port on which MySQL is listening.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database (schema) name.
    pub name: String,
    /// User name used to authenticate.
    pub username: String,
    /// Optional password used to authenticate.
    pub password: Option<SecretString>,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Time to wait for a pooled connection before giving up, in milliseconds.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl MySqlConnectionConfig {
    /// Default MySQL port.
    pub const DEFAULT_PORT: u16 = 3306;

    /// Default pool size, one connection per default stream.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 3;

    /// Default pool acquire timeout.
    pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

    /// Validates pool sizing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.max_connections".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
