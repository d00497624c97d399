//! Incremental watermark sync from a relational source into a warehouse.
//!
//! A [`pipeline::SyncPipeline`] runs once per invocation over a fixed set of streams. Each
//! stream is a parameterized source query bounded below by the stream's watermark, loaded into
//! one destination table. Watermarks advance only after the rows they cover were loaded and
//! downstream consumers were notified.

pub mod concurrency;
pub mod conversions;
pub mod credentials;
pub mod destination;
pub mod error;
pub mod extract;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod load;
mod macros;
pub mod notification;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
