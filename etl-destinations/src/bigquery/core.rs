use std::sync::Arc;

use etl::destination::Destination;
use etl::error::EtlResult;
use etl::types::Record;
use tracing::info;

use crate::bigquery::client::BigQueryClient;
use crate::bigquery::validation::validate_identifier;
use crate::bigquery::{BigQueryDatasetId, BigQueryProjectId};

/// A BigQuery staging destination.
///
/// Every stream's records are appended to a table of the configured dataset named after the
/// stream's destination table. Tables are append-only staging areas, duplicates across retried
/// runs are resolved downstream.
#[derive(Debug, Clone)]
pub struct BigQueryDestination {
    client: Arc<BigQueryClient>,
    dataset_id: BigQueryDatasetId,
}

impl BigQueryDestination {
    /// Creates a destination authenticated with a service account key JSON string.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        dataset_id: BigQueryDatasetId,
        sa_key: &str,
    ) -> EtlResult<Self> {
        validate_identifier("dataset", &dataset_id)?;
        let client = BigQueryClient::new_with_key(project_id, sa_key).await?;

        info!(
            project_id = client.project_id(),
            dataset_id = %dataset_id,
            "connected to bigquery"
        );

        Ok(Self {
            client: Arc::new(client),
            dataset_id,
        })
    }

    /// Returns the dataset records are inserted into.
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }
}

impl Destination for BigQueryDestination {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn insert_records(&self, table: &str, records: Vec<Record>) -> EtlResult<()> {
        validate_identifier("table", table)?;

        if records.is_empty() {
            return Ok(());
        }

        self.client
            .insert_all(&self.dataset_id, table, records)
            .await
    }
}
