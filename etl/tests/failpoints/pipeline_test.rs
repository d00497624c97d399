use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::failpoints::{COMMIT_WATERMARK__BEFORE_PUT, LOAD_CHUNK__BEFORE_INSERT};
use etl::pipeline::SyncPipeline;
use etl::state::stream::StreamPhase;
use etl::store::watermark::memory::MemoryWatermarkStore;
use etl::test_utils::failpoints::CustomFailScenario;
use etl::test_utils::fixtures::{
    CHANGE_COLUMN, customer_row, customers_stream, order_row, orders_stream, sync_config,
};
use etl::test_utils::notifier::RecordingNotifier;
use etl::test_utils::source::MemorySource;
use etl::test_utils::test_destination_wrapper::TestDestinationWrapper;
use etl::types::{Row, Stream};
use etl_telemetry::tracing::init_test_tracing;

type TestPipeline = SyncPipeline<
    MemorySource,
    TestDestinationWrapper<MemoryDestination>,
    MemoryWatermarkStore,
    RecordingNotifier,
>;

struct TestContext {
    source: MemorySource,
    destination: TestDestinationWrapper<MemoryDestination>,
    store: MemoryWatermarkStore,
    notifier: RecordingNotifier,
}

impl TestContext {
    async fn with_orders_and_customers(orders: Vec<Row>) -> Self {
        let context = Self {
            source: MemorySource::new(),
            destination: TestDestinationWrapper::wrap(MemoryDestination::new()),
            store: MemoryWatermarkStore::new(),
            notifier: RecordingNotifier::new(),
        };

        context
            .source
            .set_rows(orders_stream().source_query(), CHANGE_COLUMN, orders)
            .await;
        context
            .source
            .set_rows(
                customers_stream().source_query(),
                CHANGE_COLUMN,
                vec![customer_row(1, "2024-01-01 00:00:05")],
            )
            .await;

        context
    }

    fn pipeline(&self, chunk_size: usize, streams: Vec<Stream>) -> TestPipeline {
        SyncPipeline::new(
            &sync_config(chunk_size, None),
            streams,
            self.source.clone(),
            self.destination.clone(),
            self.store.clone(),
            Some(self.notifier.clone()),
        )
        .unwrap()
    }
}

fn orders(count: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| order_row(id, "paid", &format!("2024-01-01 00:00:{id:02}")))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn chunk_failure_is_scoped_to_its_table() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(LOAD_CHUNK__BEFORE_INSERT, "return(orders)")]);
    let context = TestContext::with_orders_and_customers(orders(3)).await;
    let pipeline = context.pipeline(500, vec![orders_stream(), customers_stream()]);

    let report = pipeline.run().await;

    assert!(!report.is_success());
    let orders = report.stream("orders").unwrap();
    assert_eq!(orders.phase, StreamPhase::Failed);
    assert_eq!(
        orders.error.as_ref().map(|err| err.kind()),
        Some(ErrorKind::FailpointTriggered)
    );
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
    assert!(context.destination.calls_for("orders").await.is_empty());
    assert!(!context.store.watermarks().await.contains_key("orders"));
}

#[tokio::test(flavor = "multi_thread")]
async fn partially_loaded_stream_is_reloaded_by_the_next_run() {
    init_test_tracing();
    let context = TestContext::with_orders_and_customers(orders(5)).await;
    let pipeline = context.pipeline(2, vec![orders_stream()]);

    // The first chunk goes through, the second one fails.
    let scenario =
        CustomFailScenario::setup(&[(LOAD_CHUNK__BEFORE_INSERT, "1*off->return(orders)")]);
    let report = pipeline.run().await;
    scenario.teardown();

    assert_eq!(report.stream("orders").unwrap().phase, StreamPhase::Failed);
    assert_eq!(context.destination.inner().records("orders").await.len(), 2);
    assert!(context.store.watermarks().await.is_empty());
    assert_eq!(context.notifier.attempts().await, 0);

    let report = pipeline.run().await;

    // Already loaded chunks are loaded again, delivery is at least once.
    assert!(report.is_success());
    assert_eq!(report.stream("orders").unwrap().rows_loaded, 5);
    assert_eq!(context.destination.inner().records("orders").await.len(), 7);
    assert_eq!(
        context.store.watermarks().await.get("orders").map(String::as_str),
        Some("2024-01-01 00:00:05")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commit_leaves_the_watermark_for_a_redo() {
    init_test_tracing();
    let context = TestContext::with_orders_and_customers(orders(3)).await;
    let pipeline = context.pipeline(500, vec![orders_stream(), customers_stream()]);

    let scenario =
        CustomFailScenario::setup(&[(COMMIT_WATERMARK__BEFORE_PUT, "return(orders)")]);
    let report = pipeline.run().await;
    scenario.teardown();

    // The notification went out before the commit failed.
    assert_eq!(context.notifier.summaries().await.len(), 1);
    assert_eq!(report.stream("orders").unwrap().phase, StreamPhase::Failed);
    assert_eq!(
        report.stream("customers").unwrap().phase,
        StreamPhase::Committed
    );
    let watermarks = context.store.watermarks().await;
    assert!(!watermarks.contains_key("orders"));
    assert_eq!(
        watermarks.get("customers").map(String::as_str),
        Some("2024-01-01 00:00:05")
    );

    let report = pipeline.run().await;

    assert!(report.is_success());
    assert_eq!(report.stream("orders").unwrap().rows_loaded, 3);
    assert_eq!(report.stream("customers").unwrap().phase, StreamPhase::Skipped);
    assert_eq!(context.notifier.summaries().await[1].message, "synced 3 rows: orders=3, customers=0");
}
