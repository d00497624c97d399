use std::fmt;

use etl::error::{ErrorKind, EtlError, EtlResult};
use etl::etl_error;
use etl::types::Record;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use tracing::{debug, warn};

/// Maximum number of rejected rows listed in an error detail.
const MAX_REPORTED_REJECTED_ROWS: usize = 10;

/// BigQuery project identifier.
pub type BigQueryProjectId = String;
/// BigQuery dataset identifier.
pub type BigQueryDatasetId = String;
/// BigQuery table identifier.
pub type BigQueryTableId = String;

/// A row BigQuery refused during a streaming insert.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RejectedRow {
    index: Option<i64>,
    reason: Option<String>,
}

impl fmt::Display for RejectedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "row {index}")?,
            None => write!(f, "row ?")?,
        }

        match &self.reason {
            Some(reason) => write!(f, " ({reason})"),
            None => Ok(()),
        }
    }
}

/// Client for streaming JSON records into BigQuery tables.
///
/// Uses the `tabledata.insertAll` API, which appends rows without requiring the schema upfront.
/// Tables must already exist.
#[derive(Clone)]
pub struct BigQueryClient {
    project_id: BigQueryProjectId,
    client: Client,
}

impl BigQueryClient {
    /// Creates a new [`BigQueryClient`] from a service account key JSON string.
    ///
    /// Parses and uses the provided service account key to authenticate with BigQuery.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        sa_key: &str,
    ) -> EtlResult<BigQueryClient> {
        let sa_key = parse_service_account_key(sa_key)
            .map_err(BQError::from)
            .map_err(bq_error_to_etl_error)?;
        let client = ClientBuilder::new()
            .build_from_service_account_key(sa_key, false)
            .await
            .map_err(bq_error_to_etl_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Returns the project the client inserts into.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Appends `records` to `dataset_id.table_id` in a single request.
    ///
    /// Fails if BigQuery rejects any row. Rows of a partially rejected request may have been
    /// persisted.
    pub async fn insert_all(
        &self,
        dataset_id: &str,
        table_id: &str,
        records: Vec<Record>,
    ) -> EtlResult<()> {
        let row_count = records.len();
        let mut request = TableDataInsertAllRequest::new();
        for record in records {
            request
                .add_row(None, record)
                .map_err(bq_error_to_etl_error)?;
        }

        debug!(
            project_id = %self.project_id,
            dataset_id,
            table = table_id,
            rows = row_count,
            "streaming rows into bigquery"
        );

        let response = self
            .client
            .tabledata()
            .insert_all(&self.project_id, dataset_id, table_id, request)
            .await
            .map_err(bq_error_to_etl_error)?;

        let rejected: Vec<RejectedRow> = response
            .insert_errors
            .unwrap_or_default()
            .into_iter()
            .map(|insert_error| RejectedRow {
                index: insert_error.index.map(i64::from),
                reason: insert_error
                    .errors
                    .and_then(|errors| errors.into_iter().find_map(|error| error.message)),
            })
            .collect();

        if !rejected.is_empty() {
            warn!(
                dataset_id,
                table = table_id,
                rejected = rejected.len(),
                rows = row_count,
                "bigquery rejected rows"
            );

            return Err(rejected_rows_to_etl_error(table_id, row_count, &rejected));
        }

        Ok(())
    }
}

impl fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Builds the error of a streaming insert whose rows were partially or fully rejected.
fn rejected_rows_to_etl_error(table_id: &str, row_count: usize, rejected: &[RejectedRow]) -> EtlError {
    let listed: Vec<String> = rejected
        .iter()
        .take(MAX_REPORTED_REJECTED_ROWS)
        .map(ToString::to_string)
        .collect();
    let remaining = rejected.len().saturating_sub(MAX_REPORTED_REJECTED_ROWS);

    let mut detail = format!(
        "{} of {row_count} rows rejected by table `{table_id}`: {}",
        rejected.len(),
        listed.join(", ")
    );
    if remaining > 0 {
        detail.push_str(&format!(" and {remaining} more"));
    }

    etl_error!(
        ErrorKind::DestinationQueryFailed,
        "BigQuery rejected rows of a streaming insert",
        detail = detail
    )
}

/// Converts BigQuery errors to ETL errors with appropriate classification.
///
/// Maps BigQuery error types to ETL error kinds for consistent error handling.
fn bq_error_to_etl_error(err: BQError) -> EtlError {
    let (kind, description) = match &err {
        // Authentication related errors
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::AuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication error",
        ),
        BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery OAuth authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication token missing",
        ),

        // Network errors
        BQError::RequestError(_) => (ErrorKind::DestinationIoError, "BigQuery request failed"),

        // Query and data errors
        BQError::ResponseError { .. } => {
            (ErrorKind::DestinationQueryFailed, "BigQuery response error")
        }

        // Serialization errors
        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),

        _ => (ErrorKind::DestinationError, "BigQuery error"),
    };

    etl_error!(kind, description, err.to_string(), source: err)
}
