use std::future::Future;

use crate::error::EtlResult;
use crate::types::{Row, Watermark};

/// Trait for relational sources able to run a watermark bounded extraction query.
///
/// Implementations are shared by every stream of a run and must allow concurrent calls. Pool
/// sizing, and therefore how many queries truly run in parallel, is up to the implementation.
pub trait Source {
    /// Runs `query` with `watermark` bound to its single `?` placeholder.
    ///
    /// Rows are returned in the order produced by the query, which is expected to sort ascending
    /// by change timestamp.
    fn fetch_rows(
        &self,
        query: &str,
        watermark: &Watermark,
    ) -> impl Future<Output = EtlResult<Vec<Row>>> + Send;
}
