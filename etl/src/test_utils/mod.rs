//! Testing utilities for sync pipelines.
//!
//! Every collaborator of [`crate::pipeline::SyncPipeline`] has an in-memory counterpart here
//! that can be scripted to fail, hang or panic:
//!
//! - [`source`] - an in-memory source honoring the watermark bound of each query
//! - [`test_destination_wrapper`] - a destination wrapper recording every insert call
//! - [`watermark_store`] - a watermark store wrapper failing reads or writes of chosen streams
//! - [`notifier`] - a notifier recording summaries, optionally failing
//! - [`fixtures`] - builders for rows, streams and sync configs
//! - [`failpoints`] - scoped activation of the `fail` crate's failpoints

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod notifier;
pub mod fixtures;
pub mod source;
pub mod test_destination_wrapper;
pub mod watermark_store;
