use std::future::Future;

use crate::error::EtlResult;
use crate::types::Record;

/// Trait for warehouses receiving sanitized records.
///
/// Destinations are append-only staging areas: the same record may be inserted more than once
/// across retried runs and deduplication happens downstream. No schema needs to be declared
/// ahead of an insert.
///
/// A single call receives at most one chunk of records. Implementations are shared by the load
/// tasks of all streams and must accept concurrent calls for different tables.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Inserts `records` into `table`, in order.
    ///
    /// Either every record is accepted or an error is returned. A failed call may still have
    /// persisted a subset of the records.
    fn insert_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
