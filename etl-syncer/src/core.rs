use etl::credentials::{ConfigCredentialProvider, CredentialProvider, ServiceAccountCredentials};
use etl::pipeline::{SyncPipeline, SyncReport};
use etl::source::mysql::MySqlSource;
use etl::store::watermark::WatermarkStore;
use etl::store::watermark::memory::MemoryWatermarkStore;
use etl::store::watermark::mysql::MySqlWatermarkStore;
use etl::types::Stream;
use etl_config::shared::{SyncerConfig, WatermarkStoreConfig};
use etl_destinations::bigquery::BigQueryDestination;
use etl_mysql::db::connect_to_source_database;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::error::SyncerResult;
use crate::notification::WorkflowNotifier;

/// Runs a single sync with the provided configuration.
///
/// Fetches the service account key, connects to the source, builds the watermark store, the
/// destination and the optional notifier, and runs the pipeline once. Failures before the run
/// starts are returned as errors; everything that happens during the run is in the report.
pub async fn run_syncer_with_config(config: SyncerConfig) -> SyncerResult<SyncReport> {
    info!("starting syncer run");

    log_config(&config);

    let provider = ConfigCredentialProvider::new(config.credentials.clone());
    let credentials = ServiceAccountCredentials::parse(provider.fetch().await?)?;
    let project_id = match &config.destination.project_id {
        Some(project_id) => project_id.clone(),
        None => credentials.project_id().to_string(),
    };

    let pool = connect_to_source_database(&config.source).await?;
    let source = MySqlSource::new(pool.clone());
    source.check_server_version().await?;

    let destination = BigQueryDestination::new_with_key(
        project_id,
        config.destination.dataset_id.clone(),
        credentials.key().expose_secret(),
    )
    .await?;

    let notifier = match &config.notification {
        Some(notification) => Some(WorkflowNotifier::new(notification, credentials.clone())?),
        None => {
            warn!("no workflow notification configured, runs will not trigger downstream processing");
            None
        }
    };

    // Each store is a distinct type, so the pipeline is built once per variant.
    match &config.watermark_store {
        WatermarkStoreConfig::Memory => {
            warn!("watermarks are kept in memory, every run rescans all streams");
            let store = MemoryWatermarkStore::new();
            run_pipeline(&config, source, destination, store, notifier).await
        }
        WatermarkStoreConfig::MySql { table } => {
            let store = MySqlWatermarkStore::new(pool, table.clone())?;
            store.ensure_table().await?;
            run_pipeline(&config, source, destination, store, notifier).await
        }
    }
}

async fn run_pipeline<W>(
    config: &SyncerConfig,
    source: MySqlSource,
    destination: BigQueryDestination,
    store: W,
    notifier: Option<WorkflowNotifier>,
) -> SyncerResult<SyncReport>
where
    W: WatermarkStore,
{
    let streams = config.streams.iter().cloned().map(Stream::from).collect();

    let pipeline = SyncPipeline::new(&config.sync, streams, source, destination, store, notifier)?;
    let report = pipeline.run().await;

    info!(
        run_id = %report.run_id,
        rows = report.total_rows_loaded,
        success = report.is_success(),
        "syncer run finished"
    );

    Ok(report)
}

fn log_config(config: &SyncerConfig) {
    info!(
        host = %config.source.host,
        port = config.source.port,
        database = %config.source.name,
        max_connections = config.source.max_connections,
        "source config"
    );
    info!(
        dataset_id = %config.destination.dataset_id,
        project_id = ?config.destination.project_id,
        secret_id = config.credentials.secret_id(),
        "destination config"
    );
    info!(
        chunk_size = config.sync.chunk_size,
        operation_timeout_ms = ?config.sync.operation_timeout_ms,
        streams = config.streams.len(),
        "sync config"
    );
    for stream in &config.streams {
        info!(
            stream_id = %stream.id,
            destination_table = %stream.destination_table,
            fields = stream.fields.len(),
            "stream config"
        );
    }
}
