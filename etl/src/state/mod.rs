//! Per-run stream state.
//!
//! Each stream of a run moves through the phases of [`stream::StreamPhase`]:
//!
//! ```text
//! Pending -> Extracted -> Loaded -> Committed
//!    |           |          |
//!    |           +----------+------> Failed
//!    +-----------+-----------------> Skipped
//! ```
//!
//! State lives only for the duration of a run. The watermark store is the sole persistent
//! state across runs.

pub mod stream;
