//! Persistent state of the sync engine.

pub mod watermark;
