//! Warehouse destination abstractions.
//!
//! This module provides the [`Destination`] trait the chunked loader writes through, and an
//! in-memory implementation for tests and local runs.

mod base;
pub mod memory;

pub use base::Destination;
