use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

fn default_change_timestamp_column() -> String {
    StreamConfig::DEFAULT_CHANGE_TIMESTAMP_COLUMN.to_string()
}

/// A single source-query-to-destination-table sync unit.
///
/// The set of streams is fixed at deploy time. `source_query` must filter with a strictly
/// greater than comparison against a single `?` placeholder and order ascending by the change
/// timestamp, for example:
///
/// ```sql
/// SELECT id AS order_id, status, updated_at FROM orders WHERE updated_at > ? ORDER BY updated_at ASC
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stable identifier, also used as the watermark key.
    pub id: String,
    /// Parameterized extraction query.
    pub source_query: String,
    /// Table in the destination dataset receiving the rows.
    pub destination_table: String,
    /// Column holding the change timestamp of each row.
    #[serde(default = "default_change_timestamp_column")]
    pub change_timestamp_column: String,
    /// Fields the destination table accepts.
    ///
    /// Any other column returned by the query, except the change timestamp column, fails the
    /// stream instead of silently reaching the destination.
    pub fields: Vec<String>,
}

impl StreamConfig {
    /// Default change timestamp column.
    pub const DEFAULT_CHANGE_TIMESTAMP_COLUMN: &'static str = "updated_at";

    /// Validates the stream definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(invalid("streams.id", "must not be empty"));
        }

        if self.destination_table.trim().is_empty() {
            return Err(invalid(
                &format!("streams.{}.destination_table", self.id),
                "must not be empty",
            ));
        }

        if self.change_timestamp_column.trim().is_empty() {
            return Err(invalid(
                &format!("streams.{}.change_timestamp_column", self.id),
                "must not be empty",
            ));
        }

        // Placeholders inside string literals are not expected in extraction queries.
        let placeholders = self.source_query.matches('?').count();
        if placeholders != 1 {
            return Err(ValidationError::InvalidWatermarkPlaceholder {
                stream_id: self.id.clone(),
                found: placeholders,
            });
        }

        if self.fields.is_empty() {
            return Err(invalid(
                &format!("streams.{}.fields", self.id),
                "must declare at least one field",
            ));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.as_str()) {
                return Err(ValidationError::DuplicateField {
                    stream_id: self.id.clone(),
                    field: field.clone(),
                });
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, constraint: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field.to_string(),
        constraint: constraint.to_string(),
    }
}
