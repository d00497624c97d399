use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// BigQuery warehouse settings.
///
/// Credentials are not part of this block; they are fetched at run start through
/// [`crate::shared::CredentialsConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Dataset containing every destination table.
    pub dataset_id: String,
    /// Google Cloud project identifier.
    ///
    /// If not set, the project id of the service account key is used.
    pub project_id: Option<String>,
}

impl BigQueryConfig {
    /// Validates the destination settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dataset_id.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "destination.dataset_id".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
