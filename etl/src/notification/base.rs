use std::future::Future;

use crate::error::EtlResult;
use crate::notification::SyncSummary;

/// Trait for signaling downstream consumers that a run loaded new rows.
///
/// Implementations make a single attempt. A failure fails the whole run, which keeps every
/// watermark of the run in place so the next run redoes both the load and the notification.
pub trait Notifier {
    /// Delivers `summary` to the downstream consumer.
    fn notify(&self, summary: &SyncSummary) -> impl Future<Output = EtlResult<()>> + Send;
}
