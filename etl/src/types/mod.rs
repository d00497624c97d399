//! Common types used throughout the sync engine.
//!
//! Rows are read from the source as ordered [`Row`]s of typed [`Cell`]s and leave the engine as
//! flat JSON [`Record`]s. Progress of every [`Stream`] is tracked with a [`Watermark`].

mod cell;
mod row;
mod stream;
mod watermark;

pub use cell::*;
pub use row::*;
pub use stream::*;
pub use watermark::*;
