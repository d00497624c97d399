use std::collections::HashSet;

use serde::Deserialize;

use crate::Config;
use crate::shared::{
    BigQueryConfig, CredentialsConfig, MySqlConnectionConfig, StreamConfig, SyncConfig,
    ValidationError, WatermarkStoreConfig, WorkflowNotificationConfig,
};

/// Complete configuration of the syncer.
///
/// Aggregates the source connection, the warehouse destination, the credential source,
/// the watermark store, the run tunables, the statically configured streams and the
/// optional downstream workflow trigger.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncerConfig {
    /// Relational source connection.
    pub source: MySqlConnectionConfig,
    /// Warehouse destination.
    pub destination: BigQueryConfig,
    /// Source of the warehouse service account key.
    pub credentials: CredentialsConfig,
    /// Watermark persistence.
    #[serde(default)]
    pub watermark_store: WatermarkStoreConfig,
    /// Run tunables.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Streams synced by every run.
    pub streams: Vec<StreamConfig>,
    /// Optional downstream workflow trigger.
    #[serde(default)]
    pub notification: Option<WorkflowNotificationConfig>,
}

impl SyncerConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.destination.validate()?;
        self.sync.validate()?;

        if let Some(notification) = &self.notification {
            notification.validate()?;
        }

        if self.streams.is_empty() {
            return Err(ValidationError::NoStreams);
        }

        let mut ids = HashSet::with_capacity(self.streams.len());
        for stream in &self.streams {
            stream.validate()?;

            if !ids.insert(stream.id.as_str()) {
                return Err(ValidationError::DuplicateStreamId(stream.id.clone()));
            }
        }

        Ok(())
    }
}

impl Config for SyncerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["notification.scopes"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> serde_json::Value {
        serde_json::json!({
            "source": {
                "host": "localhost",
                "name": "shop",
                "username": "etl",
                "password": "secret"
            },
            "destination": { "dataset_id": "ecommerce_analytics" },
            "credentials": { "env": { "var": "GCP_SA_KEY" } },
            "watermark_store": { "mysql": {} },
            "streams": [
                {
                    "id": "orders",
                    "source_query": "SELECT id AS order_id, status, updated_at FROM orders WHERE updated_at > ? ORDER BY updated_at ASC",
                    "destination_table": "orders",
                    "fields": ["order_id", "status"]
                }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> SyncerConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = parse(base_config());

        assert_eq!(config.source.port, MySqlConnectionConfig::DEFAULT_PORT);
        assert_eq!(config.sync.chunk_size, SyncConfig::DEFAULT_CHUNK_SIZE);
        assert_eq!(config.sync.operation_timeout(), None);
        assert_eq!(config.streams[0].change_timestamp_column, "updated_at");
        assert!(config.notification.is_none());
        assert!(matches!(
            config.watermark_store,
            WatermarkStoreConfig::MySql { ref table } if table == WatermarkStoreConfig::DEFAULT_TABLE
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut value = base_config();
        value["sync"] = serde_json::json!({ "chunk_size": 0 });

        let err = parse(value).validate().unwrap_err();

        assert_eq!(
            err,
            ValidationError::InvalidFieldValue {
                field: "sync.chunk_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            }
        );
    }

    #[test]
    fn duplicate_stream_ids_are_rejected() {
        let mut value = base_config();
        let stream = value["streams"][0].clone();
        value["streams"].as_array_mut().unwrap().push(stream);

        let err = parse(value).validate().unwrap_err();

        assert_eq!(err, ValidationError::DuplicateStreamId("orders".to_string()));
    }

    #[test]
    fn query_without_placeholder_is_rejected() {
        let mut value = base_config();
        value["streams"][0]["source_query"] =
            serde_json::json!("SELECT * FROM orders WHERE updated_at > NOW() - INTERVAL 1 HOUR");

        let err = parse(value).validate().unwrap_err();

        assert_eq!(
            err,
            ValidationError::InvalidWatermarkPlaceholder {
                stream_id: "orders".to_string(),
                found: 0,
            }
        );
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut value = base_config();
        value["streams"][0]["fields"] = serde_json::json!(["order_id", "order_id"]);

        let err = parse(value).validate().unwrap_err();

        assert_eq!(
            err,
            ValidationError::DuplicateField {
                stream_id: "orders".to_string(),
                field: "order_id".to_string(),
            }
        );
    }

    #[test]
    fn empty_stream_list_is_rejected() {
        let mut value = base_config();
        value["streams"] = serde_json::json!([]);

        assert_eq!(parse(value).validate().unwrap_err(), ValidationError::NoStreams);
    }

    #[test]
    fn notification_url_must_be_http() {
        let mut value = base_config();
        value["notification"] = serde_json::json!({ "url": "ftp://example.com" });

        let config = parse(value);

        assert_eq!(
            config.notification.as_ref().unwrap().scopes,
            vec![WorkflowNotificationConfig::DEFAULT_SCOPE.to_string()]
        );
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidFieldValue { field, .. } if field == "notification.url"
        ));
    }
}
