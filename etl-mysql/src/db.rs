use std::num::NonZeroI32;
use std::time::Duration;

use etl_config::shared::MySqlConnectionConfig;
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{MySqlPool, Row};
use tracing::info;

/// Session time zone applied to every pooled connection.
///
/// `TIMESTAMP` columns are rendered in the session time zone, so pinning it keeps watermarks
/// comparable across runs.
const SESSION_TIME_ZONE: &str = "+00:00";

/// Builds [`MySqlConnectOptions`] for the configured database.
pub fn connect_options(config: &MySqlConnectionConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .database(&config.name)
        .timezone(Some(SESSION_TIME_ZONE.to_string()));

    if let Some(password) = &config.password {
        options = options.password(password.expose_secret());
    }

    options
}

/// Connects to the source database with a lazily filled connection pool.
///
/// The pool never holds more than `max_connections` connections, and acquiring a connection
/// fails after `acquire_timeout_ms`.
pub async fn connect_to_source_database(
    config: &MySqlConnectionConfig,
) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
        .connect_with(connect_options(config))
        .await?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        max_connections = config.max_connections,
        "connected to source database"
    );

    Ok(pool)
}

/// Reads the numeric server version of the database behind `pool`.
pub async fn server_version(pool: &MySqlPool) -> Result<Option<NonZeroI32>, sqlx::Error> {
    let row = sqlx::query("SELECT VERSION() AS version")
        .fetch_one(pool)
        .await?;
    let version: String = row.try_get("version")?;

    Ok(extract_server_version(version))
}

/// Extracts the MySQL server version from a version string.
///
/// Parses version strings like "8.0.35" or "5.7.44-log" and returns
/// `MAJOR * 10000 + MINOR * 100 + PATCH`, e.g. 80035 for MySQL 8.0.35.
///
/// Returns `None` if the version string cannot be parsed or results in zero.
pub fn extract_server_version(server_version_str: impl AsRef<str>) -> Option<NonZeroI32> {
    let version_part = server_version_str
        .as_ref()
        .split_whitespace()
        .next()
        .unwrap_or("0.0.0");
    let version_part = version_part.split('-').next().unwrap_or("0.0.0");

    let mut components = version_part
        .split('.')
        .map(|component| component.parse::<i32>().unwrap_or(0));

    let major = components.next().unwrap_or(0);
    let minor = components.next().unwrap_or(0);
    let patch = components.next().unwrap_or(0);

    NonZeroI32::new(major * 10000 + minor * 100 + patch)
}
