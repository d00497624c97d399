use std::time::Duration;

use tracing::{debug, warn};

use crate::concurrency::deadline::with_deadline;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::store::watermark::WatermarkStore;
use crate::types::{StreamId, Watermark};

/// Reads and writes stream watermarks with asymmetric failure handling.
///
/// A missing or unreadable watermark must never block extraction, so [`WatermarkClient::get`]
/// falls back to [`Watermark::min`] and logs. The worst case is a full re-scan, which the
/// append-only destination tolerates. A lost write would silently cause duplicate work on every
/// following run, so [`WatermarkClient::put`] propagates every error.
///
/// With a deadline, a read that does not complete in time counts as unreadable and a write that
/// does not complete in time fails with [`ErrorKind::OperationTimedOut`].
#[derive(Debug, Clone)]
pub struct WatermarkClient<S> {
    store: S,
    deadline: Option<Duration>,
}

impl<S> WatermarkClient<S>
where
    S: WatermarkStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    /// Bounds every read and write by `deadline`, when set.
    pub fn with_operation_timeout(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns the current watermark of `stream_id`, never failing.
    pub async fn get(&self, stream_id: &StreamId) -> Watermark {
        let read = self.store.get_watermark(stream_id.as_str());
        let stored = match with_deadline(self.deadline, read).await {
            Ok(Ok(stored)) => stored,
            Ok(Err(err)) => {
                warn!(%stream_id, error = %err, "failed to read watermark, starting from the minimum");
                return Watermark::min();
            }
            Err(exceeded) => {
                warn!(%stream_id, timeout = ?exceeded.timeout, "watermark read timed out, starting from the minimum");
                return Watermark::min();
            }
        };

        let Some(stored) = stored else {
            debug!(%stream_id, "no watermark stored, starting from the minimum");
            return Watermark::min();
        };

        match Watermark::parse(&stored) {
            Ok(watermark) => watermark,
            Err(err) => {
                warn!(%stream_id, stored = %stored, error = %err, "stored watermark is invalid, starting from the minimum");
                Watermark::min()
            }
        }
    }

    /// Persists `watermark` for `stream_id` in canonical form.
    pub async fn put(&self, stream_id: &StreamId, watermark: &Watermark) -> EtlResult<()> {
        let canonical = watermark.to_string();
        let write = self
            .store
            .put_watermark(stream_id.as_str(), &canonical);

        match with_deadline(self.deadline, write).await {
            Ok(result) => result,
            Err(exceeded) => Err(etl_error!(
                ErrorKind::OperationTimedOut,
                "Watermark write did not complete in time",
                format!("stream `{stream_id}` at {watermark} exceeded {:?}", exceeded.timeout),
                source: exceeded
            )),
        }
    }
}
