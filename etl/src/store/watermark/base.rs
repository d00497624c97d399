use std::future::Future;

use crate::error::EtlResult;

/// Trait for durable stores holding one watermark per stream.
///
/// Values are canonical timestamp strings keyed by stream id. There is a single logical record
/// per stream and the last write wins. Runs are serialized by the invoking scheduler, so
/// implementations do not need to arbitrate concurrent writers of the same key.
pub trait WatermarkStore {
    /// Returns the stored watermark of `stream_id`, or [`None`] if none was ever written.
    fn get_watermark(
        &self,
        stream_id: &str,
    ) -> impl Future<Output = EtlResult<Option<String>>> + Send;

    /// Stores `watermark` for `stream_id`, replacing any previous value.
    fn put_watermark(
        &self,
        stream_id: &str,
        watermark: &str,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
