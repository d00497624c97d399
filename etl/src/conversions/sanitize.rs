//! Row sanitization.
//!
//! Turns a source [`Row`] into a [`Record`] the warehouse accepts on its append path:
//!
//! - dates, datetimes and timestamps are rendered as canonical `YYYY-MM-DD HH:MM:SS` strings
//!   truncated to whole seconds, a date being rendered at midnight. Times of day carry no date
//!   and are rendered as `HH:MM:SS`;
//! - null values are omitted, since the destination rejects explicit nulls on insert;
//! - columns the stream does not declare fail the row, except the change timestamp column
//!   which is used for watermarking only.
//!
//! Sanitizing is pure and deterministic, and sanitizing an already sanitized record is a no-op.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveTime;
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{CANONICAL_TIMESTAMP_FORMAT, Cell, Record, Row, Stream};

const TIME_FORMAT: &str = "%H:%M:%S";

/// Sanitizes the rows of a single stream.
#[derive(Debug, Clone)]
pub struct RowSanitizer {
    stream: Stream,
}

impl RowSanitizer {
    pub fn new(stream: Stream) -> Self {
        Self { stream }
    }

    /// Builds the destination record of `row`.
    ///
    /// Fails with [`ErrorKind::SchemaDrift`] when the row carries a column the destination table
    /// does not declare.
    pub fn sanitize(&self, row: &Row) -> EtlResult<Record> {
        let mut record = Record::new();

        for (column, cell) in row.iter() {
            if !self.stream.declares(column) {
                if column == self.stream.change_timestamp_column() {
                    continue;
                }

                bail!(
                    ErrorKind::SchemaDrift,
                    "Row contains a field the destination table does not declare",
                    format!(
                        "field `{column}` is not declared for stream `{}`",
                        self.stream.id()
                    )
                );
            }

            if let Some(value) = cell_to_json(cell)? {
                record.insert(column.to_string(), value);
            }
        }

        Ok(record)
    }

    /// Sanitizes every row of a batch, preserving order.
    pub fn sanitize_all(&self, rows: &[Row]) -> EtlResult<Vec<Record>> {
        rows.iter().map(|row| self.sanitize(row)).collect()
    }
}

/// Converts a cell to its JSON representation, or [`None`] for nulls.
fn cell_to_json(cell: &Cell) -> EtlResult<Option<Value>> {
    let value = match cell {
        Cell::Null => return Ok(None),
        Cell::Bool(value) => Value::Bool(*value),
        Cell::I64(value) => Value::from(*value),
        Cell::U64(value) => Value::from(*value),
        Cell::F64(value) => match serde_json::Number::from_f64(*value) {
            Some(number) => Value::Number(number),
            None => bail!(
                ErrorKind::ConversionError,
                "Non finite float cannot be inserted",
                format!("value {value} has no JSON representation")
            ),
        },
        Cell::Numeric(value) | Cell::String(value) => Value::String(value.clone()),
        Cell::Bytes(value) => Value::String(STANDARD.encode(value)),
        Cell::Date(value) => Value::String(
            value
                .and_time(NaiveTime::MIN)
                .format(CANONICAL_TIMESTAMP_FORMAT)
                .to_string(),
        ),
        Cell::Time(value) => Value::String(value.format(TIME_FORMAT).to_string()),
        Cell::DateTime(value) => Value::String(value.format(CANONICAL_TIMESTAMP_FORMAT).to_string()),
        Cell::TimestampTz(value) => Value::String(
            value
                .naive_utc()
                .format(CANONICAL_TIMESTAMP_FORMAT)
                .to_string(),
        ),
        // JSON columns are inserted as their serialized text.
        Cell::Json(Value::Null) => return Ok(None),
        Cell::Json(value) => Value::String(value.to_string()),
    };

    Ok(Some(value))
}
