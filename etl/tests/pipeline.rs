#![cfg(feature = "test-utils")]

use std::time::Duration;

use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::pipeline::{RunStatus, SyncPipeline};
use etl::state::stream::StreamPhase;
use etl::store::watermark::WatermarkStore;
use etl::store::watermark::memory::MemoryWatermarkStore;
use etl::test_utils::fixtures::{
    CHANGE_COLUMN, customer_row, customers_stream, order_row, orders_stream, query, stream,
    sync_config, timestamp,
};
use etl::test_utils::notifier::RecordingNotifier;
use etl::test_utils::source::{MemorySource, SourceFault};
use etl::test_utils::test_destination_wrapper::{DestinationFault, TestDestinationWrapper};
use etl::test_utils::watermark_store::{FaultInjectingWatermarkStore, WatermarkFault};
use etl::types::{Row, Stream, Watermark};
use etl_config::shared::{StreamConfig, SyncConfig};
use etl_telemetry::tracing::init_test_tracing;
use serde_json::json;

type TestDestination = TestDestinationWrapper<MemoryDestination>;

type TestPipeline<W> = SyncPipeline<MemorySource, TestDestination, W, RecordingNotifier>;

struct TestContext {
    source: MemorySource,
    destination: TestDestination,
    store: MemoryWatermarkStore,
    notifier: RecordingNotifier,
}

impl TestContext {
    fn new() -> Self {
        Self {
            source: MemorySource::new(),
            destination: TestDestinationWrapper::wrap(MemoryDestination::new()),
            store: MemoryWatermarkStore::new(),
            notifier: RecordingNotifier::new(),
        }
    }

    async fn set_rows(&self, stream: &Stream, rows: Vec<Row>) {
        self.source
            .set_rows(stream.source_query(), CHANGE_COLUMN, rows)
            .await;
    }

    fn pipeline(&self, streams: Vec<Stream>) -> TestPipeline<MemoryWatermarkStore> {
        self.pipeline_with(
            &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, None),
            streams,
            self.store.clone(),
        )
    }

    fn pipeline_with<W>(&self, config: &SyncConfig, streams: Vec<Stream>, store: W) -> TestPipeline<W>
    where
        W: WatermarkStore,
    {
        SyncPipeline::new(
            config,
            streams,
            self.source.clone(),
            self.destination.clone(),
            store,
            Some(self.notifier.clone()),
        )
        .unwrap()
    }

    async fn stored_watermark(&self, stream_id: &str) -> Option<String> {
        self.store.watermarks().await.get(stream_id).cloned()
    }
}

fn three_orders() -> Vec<Row> {
    vec![
        order_row(1, "paid", "2024-01-01 00:00:01"),
        order_row(2, "shipped", "2024-01-01 00:00:02"),
        order_row(3, "paid", "2024-01-01 00:00:03"),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn first_run_loads_everything_and_second_run_is_a_noop() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context.set_rows(&customers_stream(), Vec::new()).await;
    let pipeline = context.pipeline(vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(report.total_rows_loaded, 3);
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Committed);
    assert_eq!(orders.previous_watermark, Watermark::min());
    assert_eq!(orders.watermark.to_string(), "2024-01-01 00:00:03");
    assert_eq!(report.stream("customers").unwrap().phase, StreamPhase::Skipped);
    assert_eq!(
        context.stored_watermark("orders").await.as_deref(),
        Some("2024-01-01 00:00:03")
    );
    assert_eq!(context.stored_watermark("customers").await, None);

    let summaries = context.notifier.summaries().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total_rows, 3);
    assert_eq!(summaries[0].run_id, report.run_id);
    assert_eq!(summaries[0].message, "synced 3 rows: orders=3, customers=0");

    let loaded = context.destination.inner().records("orders").await;
    assert_eq!(
        serde_json::Value::Array(loaded.into_iter().map(serde_json::Value::Object).collect()),
        json!([
            { "order_id": 1, "status": "paid", "amount": 10.5 },
            { "order_id": 2, "status": "shipped", "amount": 21.0 },
            { "order_id": 3, "status": "paid", "amount": 31.5 },
        ])
    );

    // Nothing changed in the source since the first run.
    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(report.total_rows_loaded, 0);
    assert_eq!(report.stream("orders").unwrap().phase, StreamPhase::Skipped);
    assert_eq!(report.stream("orders").unwrap().rows_extracted, 0);
    assert_eq!(context.notifier.attempts().await, 1);
    assert_eq!(context.destination.calls().await.len(), 1);
    assert_eq!(
        context.stored_watermark("orders").await.as_deref(),
        Some("2024-01-01 00:00:03")
    );

    let executed = context.source.executed_queries().await;
    let orders_queries: Vec<String> = executed
        .iter()
        .filter(|(executed_query, _)| *executed_query == query("orders"))
        .map(|(_, watermark)| watermark.to_string())
        .collect();
    assert_eq!(
        orders_queries,
        vec!["1970-01-01 00:00:00", "2024-01-01 00:00:03"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn new_rows_resume_from_the_committed_watermark() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    let pipeline = context.pipeline(vec![orders_stream()]);

    pipeline.run().await;
    context
        .source
        .append_rows(
            &query("orders"),
            vec![order_row(4, "paid", "2024-01-02 08:30:00")],
        )
        .await;
    let report = pipeline.run().await;

    assert_eq!(report.total_rows_loaded, 1);
    assert_eq!(
        report.stream("orders").unwrap().previous_watermark.to_string(),
        "2024-01-01 00:00:03"
    );
    assert_eq!(
        context.stored_watermark("orders").await.as_deref(),
        Some("2024-01-02 08:30:00")
    );
    assert_eq!(context.destination.inner().records("orders").await.len(), 4);
    assert_eq!(context.notifier.summaries().await[1].message, "synced 1 rows: orders=1");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_run_touches_nothing() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), Vec::new()).await;
    context.set_rows(&customers_stream(), Vec::new()).await;
    let pipeline = context.pipeline(vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert!(!report.notified);
    assert_eq!(context.notifier.attempts().await, 0);
    assert!(context.destination.calls().await.is_empty());
    assert!(context.store.watermarks().await.is_empty());
    assert_eq!(report.outcome().message, "synced 0 rows: orders=0, customers=0");
}

#[tokio::test(flavor = "multi_thread")]
async fn records_are_sanitized_before_loading() {
    init_test_tracing();
    let context = TestContext::new();
    let customers = stream("customers", &["customer_id", "email", CHANGE_COLUMN]);
    context
        .set_rows(
            &customers,
            vec![
                customer_row(7, "2024-01-01 00:00:01"),
                Row::new()
                    .with("customer_id", 8i64)
                    .with("email", "ada@example.com")
                    .with(CHANGE_COLUMN, timestamp("2024-01-01 00:00:02")),
            ],
        )
        .await;
    let pipeline = context.pipeline(vec![customers]);

    pipeline.run().await;

    let records = context.destination.inner().records("customers").await;
    // Null emails are dropped from the record instead of being sent as explicit nulls.
    assert_eq!(
        serde_json::Value::Object(records[0].clone()),
        json!({ "customer_id": 7, "updated_at": "2024-01-01 00:00:01" })
    );
    assert_eq!(
        serde_json::Value::Object(records[1].clone()),
        json!({ "customer_id": 8, "email": "ada@example.com", "updated_at": "2024-01-01 00:00:02" })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_are_loaded_in_bounded_chunks() {
    init_test_tracing();
    let context = TestContext::new();
    let rows = (0..1201)
        .map(|id| order_row(id, "paid", "2024-01-01 00:00:01"))
        .collect();
    context.set_rows(&orders_stream(), rows).await;
    let pipeline = context.pipeline_with(
        &sync_config(500, None),
        vec![orders_stream()],
        context.store.clone(),
    );

    let report = pipeline.run().await;

    assert_eq!(report.total_rows_loaded, 1201);
    let sizes: Vec<usize> = context
        .destination
        .calls_for("orders")
        .await
        .iter()
        .map(|call| call.records.len())
        .collect();
    assert_eq!(sizes, vec![500, 500, 201]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_extraction_skips_only_its_stream() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    context
        .source
        .inject_fault(&query("orders"), SourceFault::Error)
        .await;
    let pipeline = context.pipeline(vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    // Extraction failures are isolated and do not fail the run.
    assert!(report.is_success());
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Skipped);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::SourceQueryFailed)
    );
    assert_eq!(context.stored_watermark("orders").await, None);
    assert_eq!(
        context.stored_watermark("customers").await.as_deref(),
        Some("2024-01-01 00:00:05")
    );
    assert_eq!(context.notifier.summaries().await[0].total_rows, 1);

    // The skipped window is retried once the source recovers.
    context.source.clear_fault(&query("orders")).await;
    let report = pipeline.run().await;

    assert_eq!(report.stream("orders").unwrap().rows_loaded, 3);
    assert_eq!(report.stream("orders").unwrap().phase, StreamPhase::Committed);
}

#[tokio::test(flavor = "multi_thread")]
async fn hung_extraction_is_skipped_after_the_deadline() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    context
        .source
        .inject_fault(&query("orders"), SourceFault::Hang)
        .await;
    let pipeline = context.pipeline_with(
        &sync_config(500, Some(200)),
        vec![orders_stream(), customers_stream()],
        context.store.clone(),
    );

    let report = tokio::time::timeout(Duration::from_secs(10), pipeline.run())
        .await
        .expect("the run must not hang");

    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Skipped);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::SourceQueryTimedOut)
    );
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_extraction_fails_only_its_stream() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    context
        .source
        .inject_fault(&query("orders"), SourceFault::Panic)
        .await;
    let pipeline = context.pipeline(vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    assert!(!report.is_success());
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::SyncTaskPanic)
    );
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_load_fails_the_run_but_commits_other_streams() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    context
        .destination
        .inject_fault("orders", DestinationFault::Fail)
        .await;
    let pipeline = context.pipeline(vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    assert!(!report.is_success());
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(orders.watermark, Watermark::min());
    assert_eq!(context.stored_watermark("orders").await, None);
    assert_eq!(
        context.stored_watermark("customers").await.as_deref(),
        Some("2024-01-01 00:00:05")
    );
    assert_eq!(
        report.error().map(|err| err.kinds()),
        Some(vec![ErrorKind::DestinationQueryFailed])
    );

    let summaries = context.notifier.summaries().await;
    assert_eq!(summaries[0].message, "synced 1 rows: customers=1");

    let outcome = report.outcome();
    assert_eq!(outcome.status, RunStatus::Failure);
    assert!(outcome.message.starts_with("sync failed: stream orders (DestinationQueryFailed)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_notification_commits_no_watermark() {
    init_test_tracing();
    let mut context = TestContext::new();
    context.notifier = RecordingNotifier::failing();
    context.set_rows(&orders_stream(), three_orders()).await;
    let pipeline = context.pipeline(vec![orders_stream()]);

    let report = pipeline.run().await;

    assert!(!report.is_success());
    assert!(!report.notified);
    assert_eq!(
        report.notification_error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::NotificationFailed)
    );
    assert_eq!(report.stream("orders").unwrap().phase, StreamPhase::Loaded);
    assert!(context.store.watermarks().await.is_empty());
    assert_eq!(report.outcome().status, RunStatus::Failure);

    // The next run redoes the load and the notification.
    context.notifier.set_failing(false).await;
    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(report.total_rows_loaded, 3);
    assert_eq!(context.destination.inner().records("orders").await.len(), 6);
    assert_eq!(
        context.stored_watermark("orders").await.as_deref(),
        Some("2024-01-01 00:00:03")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_watermark_rescans_from_the_minimum() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    let store = FaultInjectingWatermarkStore::wrap(
        MemoryWatermarkStore::with_watermarks([("orders", "2024-01-01 00:00:02")]),
        WatermarkFault::read("orders"),
    );
    let pipeline = context.pipeline_with(
        &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, None),
        vec![orders_stream()],
        store.clone(),
    );

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(report.stream("orders").unwrap().rows_loaded, 3);
    assert_eq!(
        store.inner().watermarks().await.get("orders").map(String::as_str),
        Some("2024-01-01 00:00:03")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_watermark_write_fails_its_stream() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    let store = FaultInjectingWatermarkStore::wrap(
        MemoryWatermarkStore::new(),
        WatermarkFault::write("orders"),
    );
    let pipeline = context.pipeline_with(
        &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, None),
        vec![orders_stream(), customers_stream()],
        store.clone(),
    );

    let report = pipeline.run().await;

    assert!(!report.is_success());
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::WatermarkWriteFailed)
    );
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
    assert_eq!(store.inner().watermarks().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn undeclared_field_fails_the_stream_before_loading() {
    init_test_tracing();
    let context = TestContext::new();
    context
        .set_rows(
            &orders_stream(),
            vec![order_row(1, "paid", "2024-01-01 00:00:01").with("coupon", "WELCOME")],
        )
        .await;
    let pipeline = context.pipeline(vec![orders_stream()]);

    let report = pipeline.run().await;

    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::SchemaDrift)
    );
    assert!(context.destination.calls().await.is_empty());
    assert_eq!(context.notifier.attempts().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_change_timestamp_fails_the_stream() {
    init_test_tracing();
    let context = TestContext::new();
    context
        .set_rows(
            &orders_stream(),
            vec![
                order_row(1, "paid", "2024-01-01 00:00:01"),
                Row::new()
                    .with("order_id", 2i64)
                    .with("status", "paid")
                    .with(CHANGE_COLUMN, None::<String>),
            ],
        )
        .await;
    let pipeline = context.pipeline(vec![orders_stream()]);

    let report = pipeline.run().await;

    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::InvalidData)
    );
    assert!(context.store.watermarks().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn runs_without_notifier_commit_after_loading() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    let pipeline: TestPipeline<MemoryWatermarkStore> = SyncPipeline::new(
        &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, None),
        vec![orders_stream()],
        context.source.clone(),
        context.destination.clone(),
        context.store.clone(),
        None,
    )
    .unwrap();

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert!(!report.notified);
    assert_eq!(
        context.stored_watermark("orders").await.as_deref(),
        Some("2024-01-01 00:00:03")
    );
    assert_eq!(
        serde_json::to_value(report.outcome()).unwrap(),
        json!({ "status": "success", "message": "synced 3 rows: orders=3" })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn hung_watermark_write_fails_its_stream_after_the_deadline() {
    init_test_tracing();
    let context = TestContext::new();
    context.set_rows(&orders_stream(), three_orders()).await;
    context
        .set_rows(
            &customers_stream(),
            vec![customer_row(1, "2024-01-01 00:00:05")],
        )
        .await;
    let store = FaultInjectingWatermarkStore::wrap(
        MemoryWatermarkStore::new(),
        WatermarkFault::write("orders").hanging(),
    );
    let pipeline = context.pipeline_with(
        &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, Some(200)),
        vec![orders_stream(), customers_stream()],
        store.clone(),
    );

    let report = pipeline.run().await;

    assert!(!report.is_success());
    assert_eq!(
        report
            .stream("orders")
            .unwrap()
            .error
            .as_ref()
            .map(|err| err.kind()),
        Some(ErrorKind::OperationTimedOut)
    );
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
    assert_eq!(store.inner().watermarks().await.get("orders"), None);
}

#[test]
fn streams_sharing_an_id_are_rejected() {
    let context = TestContext::new();
    let archive = Stream::from(StreamConfig {
        id: "orders".to_string(),
        source_query: query("orders_archive"),
        destination_table: "orders_archive".to_string(),
        change_timestamp_column: CHANGE_COLUMN.to_string(),
        fields: vec!["order_id".to_string(), "status".to_string(), "amount".to_string()],
    });

    let err = TestPipeline::<MemoryWatermarkStore>::new(
        &sync_config(SyncConfig::DEFAULT_CHUNK_SIZE, None),
        vec![orders_stream(), archive],
        context.source.clone(),
        context.destination.clone(),
        context.store.clone(),
        Some(context.notifier.clone()),
    )
    .err()
    .unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(err.detail().unwrap().contains("orders"));
}

#[test]
fn invalid_sync_config_is_rejected() {
    let context = TestContext::new();

    for config in [sync_config(0, None), sync_config(500, Some(0))] {
        let err = TestPipeline::<MemoryWatermarkStore>::new(
            &config,
            vec![orders_stream()],
            context.source.clone(),
            context.destination.clone(),
            context.store.clone(),
            Some(context.notifier.clone()),
        )
        .err()
        .unwrap();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
