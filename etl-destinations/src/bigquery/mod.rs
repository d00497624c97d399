mod client;
mod core;
mod validation;

pub use client::{BigQueryClient, BigQueryDatasetId, BigQueryProjectId, BigQueryTableId};
pub use core::BigQueryDestination;
pub use validation::validate_identifier;
