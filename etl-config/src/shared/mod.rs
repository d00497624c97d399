//! Shared configuration types for the syncer.

mod base;
mod connection;
mod credentials;
mod destination;
mod notification;
mod stream;
mod sync;
mod syncer;
mod watermark_store;

pub use base::ValidationError;
pub use connection::MySqlConnectionConfig;
pub use credentials::CredentialsConfig;
pub use destination::BigQueryConfig;
pub use notification::WorkflowNotificationConfig;
pub use stream::StreamConfig;
pub use sync::SyncConfig;
pub use syncer::SyncerConfig;
pub use watermark_store::WatermarkStoreConfig;
