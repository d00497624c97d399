use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::notification::{Notifier, SyncSummary};

#[derive(Debug, Default)]
struct Inner {
    summaries: Vec<SyncSummary>,
    attempts: usize,
    fail: bool,
}

/// [`Notifier`] recording every delivered summary.
///
/// Clones share the same recordings.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a notifier failing every call until [`RecordingNotifier::set_failing`] turns it off.
    pub fn failing() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                fail: true,
                ..Inner::default()
            })),
        }
    }

    pub async fn set_failing(&self, fail: bool) {
        self.inner.lock().await.fail = fail;
    }

    /// Returns the summaries delivered successfully.
    pub async fn summaries(&self) -> Vec<SyncSummary> {
        self.inner.lock().await.summaries.clone()
    }

    /// Returns the number of calls, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.inner.lock().await.attempts
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, summary: &SyncSummary) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.attempts += 1;

        if inner.fail {
            bail!(
                ErrorKind::NotificationFailed,
                "Injected notification failure",
                format!("run {} was not notified", summary.run_id)
            );
        }

        inner.summaries.push(summary.clone());

        Ok(())
    }
}
