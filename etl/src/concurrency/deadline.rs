//! Optional per-operation deadlines.
//!
//! Extraction queries and chunk inserts can hang on a stuck connection. When a deadline is
//! configured, [`with_deadline`] turns such a hang into a [`DeadlineExceeded`] error that the
//! caller maps onto the stream's failure policy.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Returned when an operation did not complete within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded {
    pub timeout: Duration,
}

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation did not complete within {:?}", self.timeout)
    }
}

impl std::error::Error for DeadlineExceeded {}

/// Awaits `future`, bounded by `deadline` when one is set.
///
/// The future is dropped, and therefore cancelled, once the deadline expires.
pub async fn with_deadline<F>(
    deadline: Option<Duration>,
    future: F,
) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    match deadline {
        Some(deadline) => timeout(deadline, future)
            .await
            .map_err(|_| DeadlineExceeded { timeout: deadline }),
        None => Ok(future.await),
    }
}
