//! Downstream completion notification.
//!
//! After a run loaded at least one row, the pipeline signals downstream consumers exactly once
//! through a [`Notifier`]. The concrete workflow trigger lives in the syncer binary.

mod base;
mod summary;

pub use base::Notifier;
pub use summary::{StreamSummary, SyncSummary};
