//! MySQL connection utilities for the syncer crates.
//!
//! Builds [`sqlx`] connection pools from [`etl_config::shared::MySqlConnectionConfig`] and
//! exposes helpers to inspect the server version.

pub mod db;
pub mod version;
