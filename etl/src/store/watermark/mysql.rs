use sqlx::{MySqlPool, Row};
use tracing::{debug, info};

use crate::error::{ErrorKind, EtlResult};
use crate::store::watermark::WatermarkStore;
use crate::{bail, etl_error};

/// Watermark store backed by a table of the source MySQL database.
///
/// The table holds one row per stream:
///
/// ```sql
/// CREATE TABLE etl_sync_watermarks (
///     stream_id  VARCHAR(255) NOT NULL PRIMARY KEY,
///     watermark  VARCHAR(32)  NOT NULL,
///     updated_at DATETIME     NOT NULL
/// )
/// ```
#[derive(Debug, Clone)]
pub struct MySqlWatermarkStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlWatermarkStore {
    /// Creates a store writing to `table`.
    ///
    /// The table name is interpolated into statements, so only ASCII alphanumerics and
    /// underscores are accepted.
    pub fn new(pool: MySqlPool, table: impl Into<String>) -> EtlResult<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            bail!(
                ErrorKind::ConfigError,
                "Invalid watermark table name",
                format!("`{table}` must only contain ASCII letters, digits and underscores")
            );
        }

        Ok(Self { pool, table })
    }

    /// Creates the watermark table if it does not exist yet.
    pub async fn ensure_table(&self) -> EtlResult<()> {
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\
                stream_id VARCHAR(255) NOT NULL PRIMARY KEY, \
                watermark VARCHAR(32) NOT NULL, \
                updated_at DATETIME NOT NULL\
            )",
            self.table
        );

        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::WatermarkWriteFailed,
                    "Failed to create the watermark table",
                    format!("table `{}`", self.table),
                    source: err
                )
            })?;

        info!(table = %self.table, "watermark table ready");

        Ok(())
    }
}

impl WatermarkStore for MySqlWatermarkStore {
    async fn get_watermark(&self, stream_id: &str) -> EtlResult<Option<String>> {
        let query = format!(
            "SELECT watermark FROM `{}` WHERE stream_id = ?",
            self.table
        );

        let row = sqlx::query(&query)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::WatermarkReadFailed,
                    "Failed to read the stream watermark",
                    format!("stream `{stream_id}`"),
                    source: err
                )
            })?;

        let Some(row) = row else {
            debug!(stream_id, "no stored watermark");
            return Ok(None);
        };

        let watermark: String = row.try_get("watermark").map_err(|err| {
            etl_error!(
                ErrorKind::WatermarkReadFailed,
                "Stored watermark has an unexpected type",
                format!("stream `{stream_id}`"),
                source: err
            )
        })?;

        Ok(Some(watermark))
    }

    async fn put_watermark(&self, stream_id: &str, watermark: &str) -> EtlResult<()> {
        let statement = format!(
            "INSERT INTO `{}` (stream_id, watermark, updated_at) \
             VALUES (?, ?, UTC_TIMESTAMP()) \
             ON DUPLICATE KEY UPDATE watermark = VALUES(watermark), updated_at = VALUES(updated_at)",
            self.table
        );

        sqlx::query(&statement)
            .bind(stream_id)
            .bind(watermark)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::WatermarkWriteFailed,
                    "Failed to write the stream watermark",
                    format!("stream `{stream_id}`, watermark `{watermark}`"),
                    source: err
                )
            })?;

        Ok(())
    }
}

fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table.len() <= 64
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
