use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_chunk_size() -> usize {
    SyncConfig::DEFAULT_CHUNK_SIZE
}

/// Tunables of a sync run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Maximum number of records sent to the warehouse in a single insert call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Deadline applied to each extraction query and each chunk insert, in milliseconds.
    ///
    /// When unset, operations are not bounded and a hung query blocks its stream.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl SyncConfig {
    /// Default chunk size.
    pub const DEFAULT_CHUNK_SIZE: usize = 500;

    /// Returns the per-operation deadline, if any.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Ensures the chunk size and timeout are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "sync.chunk_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.operation_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "sync.operation_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            operation_timeout_ms: None,
        }
    }
}
