//! Relational sources rows are extracted from.

mod base;
pub mod mysql;

pub use base::Source;
