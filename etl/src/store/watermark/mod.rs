//! Watermark persistence.
//!
//! [`WatermarkStore`] is the raw key-value contract of a durable store. [`WatermarkClient`]
//! wraps a store with the engine's policy: reads fail soft to the minimum watermark while writes
//! propagate every error.

mod base;
mod client;
pub mod memory;
pub mod mysql;

pub use base::WatermarkStore;
pub use client::WatermarkClient;
