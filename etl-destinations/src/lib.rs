//! Warehouse destinations for the sync engine.
//!
//! Each destination implements [`etl::destination::Destination`] and is compiled in behind its
//! own feature.

#[cfg(feature = "bigquery")]
pub mod bigquery;
