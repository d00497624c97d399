use std::num::NonZeroI32;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use etl_mysql::db::server_version;
use etl_mysql::version::{MYSQL_5_7, meets_version};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, MySqlPool, Row as _, TypeInfo};
use tracing::{debug, info, warn};

use crate::error::EtlResult;
use crate::source::Source;
use crate::types::{Cell, Row, Watermark};

/// MySQL source backed by a shared [`MySqlPool`].
///
/// Clones share the pool. Every column is decoded into a typed [`Cell`] according to the type
/// reported by the server. Values of types without a dedicated cell are read as text, or as raw
/// bytes when they are not valid UTF-8.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Logs the server version, warning about versions older than 5.7.
    pub async fn check_server_version(&self) -> EtlResult<Option<NonZeroI32>> {
        let version = server_version(&self.pool).await?;

        if meets_version(version, MYSQL_5_7) {
            info!(server_version = ?version, "source server version");
        } else {
            warn!(server_version = ?version, "source server is older than MySQL 5.7 or reports an unknown version");
        }

        Ok(version)
    }
}

impl Source for MySqlSource {
    async fn fetch_rows(&self, query: &str, watermark: &Watermark) -> EtlResult<Vec<Row>> {
        let rows = sqlx::query(query)
            .bind(watermark.as_naive())
            .fetch_all(&self.pool)
            .await?;

        debug!(rows = rows.len(), %watermark, "fetched source rows");

        rows.iter().map(decode_row).collect()
    }
}

/// Decodes every column of a MySQL row.
fn decode_row(row: &MySqlRow) -> EtlResult<Row> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for column in row.columns() {
        let index = column.ordinal();
        let type_name = column.type_info().name();
        let cell = decode_cell(row, index, type_name)?;

        decoded.push(column.name(), cell);
    }

    Ok(decoded)
}

fn decode_cell(row: &MySqlRow, index: usize, type_name: &str) -> EtlResult<Cell> {
    let cell: Cell = match type_name {
        "NULL" => Cell::Null,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.into(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.into()
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(index)?.into(),
        "BIT" => row.try_get_unchecked::<Option<u64>, _>(index)?.into(),
        "YEAR" => row
            .try_get_unchecked::<Option<u16>, _>(index)?
            .map(|year| Cell::I64(i64::from(year)))
            .unwrap_or(Cell::Null),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|value| Cell::F64(f64::from(value)))
            .unwrap_or(Cell::Null),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.into(),
        "DECIMAL" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(|value| Cell::Numeric(value.to_plain_string()))
            .unwrap_or(Cell::Null),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.into(),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(Cell::Time)
            .unwrap_or(Cell::Null),
        "DATETIME" => row.try_get::<Option<NaiveDateTime>, _>(index)?.into(),
        "TIMESTAMP" => row.try_get::<Option<DateTime<Utc>>, _>(index)?.into(),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(Cell::Json)
            .unwrap_or(Cell::Null),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            row.try_get::<Option<String>, _>(index)?.into()
        }
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(Cell::Bytes)
            .unwrap_or(Cell::Null),
        _ => decode_unknown(row, index)?,
    };

    Ok(cell)
}

/// Decodes a column of a type without a dedicated cell.
fn decode_unknown(row: &MySqlRow, index: usize) -> EtlResult<Cell> {
    let Some(bytes) = row.try_get_unchecked::<Option<Vec<u8>>, _>(index)? else {
        return Ok(Cell::Null);
    };

    Ok(match String::from_utf8(bytes) {
        Ok(text) => Cell::String(text),
        Err(err) => Cell::Bytes(err.into_bytes()),
    })
}
