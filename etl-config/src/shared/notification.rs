use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_request_timeout_ms() -> u64 {
    WorkflowNotificationConfig::DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_scopes() -> Vec<String> {
    vec![WorkflowNotificationConfig::DEFAULT_SCOPE.to_string()]
}

/// Configuration of the downstream workflow trigger.
///
/// When present, a run that loaded at least one row POSTs its summary to `url` with a
/// bearer token minted from the run's service account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNotificationConfig {
    /// Executions endpoint of the workflow to trigger.
    pub url: String,
    /// OAuth scopes requested for the bearer token.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Timeout of the trigger request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl WorkflowNotificationConfig {
    /// Scope granting access to Google Cloud APIs.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/cloud-platform";

    /// Default trigger request timeout.
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Validates the trigger settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(ValidationError::InvalidFieldValue {
                field: "notification.url".to_string(),
                constraint: "must be an http(s) url".to_string(),
            });
        }

        if self.scopes.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "notification.scopes".to_string(),
                constraint: "must contain at least one scope".to_string(),
            });
        }

        Ok(())
    }
}
