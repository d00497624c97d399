//! Warehouse credential retrieval.
//!
//! The service account key is fetched once at the start of every run. Any failure to fetch or
//! parse it aborts the run before a single stream is touched.

mod base;
mod config;
mod service_account;

pub use base::CredentialProvider;
pub use config::ConfigCredentialProvider;
pub use service_account::ServiceAccountCredentials;
