use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, EtlResult};
use crate::source::Source;
use crate::types::{Row, Watermark};
use crate::{bail, etl_error};

/// Failure scripted for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFault {
    /// The query returns an error.
    Error,
    /// The query never completes.
    Hang,
    /// The query panics.
    Panic,
}

#[derive(Debug)]
struct Table {
    change_column: String,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Table>,
    faults: HashMap<String, SourceFault>,
    executed: Vec<(String, Watermark)>,
}

/// In-memory [`Source`] answering queries from scripted rows.
///
/// Each query is bound to a list of rows and the column holding their change timestamp. A fetch
/// returns the rows whose change timestamp is strictly after the watermark, in insertion order,
/// the way an `updated_at > ? ORDER BY updated_at` query would. Rows whose change timestamp
/// cannot be read are always returned, which lets tests exercise invalid timestamps. Clones
/// share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rows answered for `query`.
    pub async fn set_rows(&self, query: &str, change_column: &str, rows: Vec<Row>) {
        self.inner.lock().await.tables.insert(
            query.to_string(),
            Table {
                change_column: change_column.to_string(),
                rows,
            },
        );
    }

    /// Appends rows to those answered for `query`.
    ///
    /// Panics if no rows were set for `query` before.
    pub async fn append_rows(&self, query: &str, rows: Vec<Row>) {
        let mut inner = self.inner.lock().await;
        let table = inner
            .tables
            .get_mut(query)
            .expect("rows must be set before appending");
        table.rows.extend(rows);
    }

    /// Scripts `fault` for every following execution of `query`.
    pub async fn inject_fault(&self, query: &str, fault: SourceFault) {
        self.inner
            .lock()
            .await
            .faults
            .insert(query.to_string(), fault);
    }

    /// Removes the fault scripted for `query`.
    pub async fn clear_fault(&self, query: &str) {
        self.inner.lock().await.faults.remove(query);
    }

    /// Returns every executed query with the watermark it was bound to.
    pub async fn executed_queries(&self) -> Vec<(String, Watermark)> {
        self.inner.lock().await.executed.clone()
    }
}

impl Source for MemorySource {
    async fn fetch_rows(&self, query: &str, watermark: &Watermark) -> EtlResult<Vec<Row>> {
        let (fault, rows) = {
            let mut inner = self.inner.lock().await;
            inner.executed.push((query.to_string(), *watermark));

            let fault = inner.faults.get(query).copied();
            let rows = inner.tables.get(query).map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|row| {
                        row.get(&table.change_column)
                            .and_then(|cell| Watermark::try_from(cell).ok())
                            .is_none_or(|changed_at| changed_at > *watermark)
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            });

            (fault, rows)
        };

        match fault {
            Some(SourceFault::Error) => bail!(
                ErrorKind::SourceQueryFailed,
                "Injected source failure",
                format!("query `{query}` failed")
            ),
            Some(SourceFault::Hang) => std::future::pending().await,
            Some(SourceFault::Panic) => panic!("injected panic while running `{query}`"),
            None => rows.ok_or_else(|| {
                etl_error!(
                    ErrorKind::SourceQueryFailed,
                    "Unknown query",
                    format!("no rows were set for query `{query}`")
                )
            }),
        }
    }
}
