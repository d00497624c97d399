use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use etl_config::shared::StreamConfig;
use serde::{Serialize, Serializer};

/// Identifier of a stream, also used as its watermark key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(Arc<str>);

impl StreamId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StreamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A statically configured source-query-to-destination-table sync unit.
///
/// Cheap to clone, every stream task of a run holds its own copy.
#[derive(Debug, Clone)]
pub struct Stream {
    id: StreamId,
    source_query: Arc<str>,
    destination_table: Arc<str>,
    change_timestamp_column: Arc<str>,
    fields: Arc<HashSet<String>>,
}

impl Stream {
    /// Returns the stream identifier.
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Returns the parameterized extraction query.
    pub fn source_query(&self) -> &str {
        &self.source_query
    }

    /// Returns the destination table name.
    pub fn destination_table(&self) -> &str {
        &self.destination_table
    }

    /// Returns the column holding each row's change timestamp.
    pub fn change_timestamp_column(&self) -> &str {
        &self.change_timestamp_column
    }

    /// Returns `true` if the destination table declares `field`.
    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

impl From<StreamConfig> for Stream {
    fn from(config: StreamConfig) -> Self {
        Self {
            id: StreamId::new(&config.id),
            source_query: Arc::from(config.source_query),
            destination_table: Arc::from(config.destination_table),
            change_timestamp_column: Arc::from(config.change_timestamp_column),
            fields: Arc::new(config.fields.into_iter().collect()),
        }
    }
}
