use serde::{Deserialize, Serialize};

fn default_table() -> String {
    WatermarkStoreConfig::DEFAULT_TABLE.to_string()
}

/// Where stream watermarks are persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkStoreConfig {
    /// Keep watermarks in memory only. Every run starts from the minimum watermark.
    #[default]
    Memory,
    /// Keep watermarks in a table of the source MySQL database.
    #[serde(rename = "mysql")]
    MySql {
        /// Name of the watermark table, created if missing.
        #[serde(default = "default_table")]
        table: String,
    },
}

impl WatermarkStoreConfig {
    /// Default watermark table name.
    pub const DEFAULT_TABLE: &'static str = "etl_sync_watermarks";
}
