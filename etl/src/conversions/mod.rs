//! Conversions from source rows to destination records.

pub mod sanitize;
