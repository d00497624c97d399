use chrono::NaiveDateTime;
use etl_config::shared::{StreamConfig, SyncConfig};

use crate::types::{CANONICAL_TIMESTAMP_FORMAT, Row, Stream};

/// Column holding the change timestamp of every fixture row.
pub const CHANGE_COLUMN: &str = "updated_at";

/// Returns the extraction query used for the fixture stream `id`.
pub fn query(id: &str) -> String {
    format!("SELECT * FROM {id} WHERE {CHANGE_COLUMN} > ? ORDER BY {CHANGE_COLUMN} ASC")
}

/// Parses a canonical `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn timestamp(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, CANONICAL_TIMESTAMP_FORMAT)
        .unwrap_or_else(|err| panic!("invalid fixture timestamp `{value}`: {err}"))
}

/// Builds a stream loading [`query`]`(id)` into a table named `id`.
pub fn stream(id: &str, fields: &[&str]) -> Stream {
    Stream::from(StreamConfig {
        id: id.to_string(),
        source_query: query(id),
        destination_table: id.to_string(),
        change_timestamp_column: CHANGE_COLUMN.to_string(),
        fields: fields.iter().map(|field| field.to_string()).collect(),
    })
}

/// Builds the `orders` fixture stream.
pub fn orders_stream() -> Stream {
    stream("orders", &["order_id", "status", "amount"])
}

/// Builds the `customers` fixture stream.
pub fn customers_stream() -> Stream {
    stream("customers", &["customer_id", "email"])
}

/// Builds an `orders` row changed at `updated_at`.
pub fn order_row(order_id: i64, status: &str, updated_at: &str) -> Row {
    Row::new()
        .with("order_id", order_id)
        .with("status", status)
        .with("amount", order_id as f64 * 10.5)
        .with(CHANGE_COLUMN, timestamp(updated_at))
}

/// Builds a `customers` row changed at `updated_at`, without an email.
pub fn customer_row(customer_id: i64, updated_at: &str) -> Row {
    Row::new()
        .with("customer_id", customer_id)
        .with("email", None::<String>)
        .with(CHANGE_COLUMN, timestamp(updated_at))
}

/// Builds a sync config with the given chunk size and an optional timeout in milliseconds.
pub fn sync_config(chunk_size: usize, operation_timeout_ms: Option<u64>) -> SyncConfig {
    SyncConfig {
        chunk_size,
        operation_timeout_ms,
    }
}
