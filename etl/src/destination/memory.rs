use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::Destination;
use crate::error::EtlResult;
use crate::types::Record;

/// In-memory destination for tests and local runs.
///
/// Records are kept per table in insertion order and lost when the process exits. Clones share
/// the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    tables: Arc<Mutex<HashMap<String, Vec<Record>>>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records inserted into `table` so far.
    pub async fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the record count of every table.
    pub async fn counts(&self) -> HashMap<String, usize> {
        self.tables
            .lock()
            .await
            .iter()
            .map(|(table, records)| (table.clone(), records.len()))
            .collect()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn insert_records(&self, table: &str, records: Vec<Record>) -> EtlResult<()> {
        info!(table, records = records.len(), "inserting records into memory destination");

        let mut tables = self.tables.lock().await;
        tables.entry(table.to_string()).or_default().extend(records);

        Ok(())
    }
}
