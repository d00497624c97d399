//! Tracing subscriber initialization.
//!
//! The syncer logs through [`tracing`]. Deployed environments emit one JSON object per line
//! so that per-stream fields (`stream_id`, `rows`, `watermark`, ...) stay queryable, while
//! development runs use a compact human readable format. Logs are written to stderr, stdout is
//! reserved for the run outcome.

use std::io;
use std::sync::Once;

use etl_config::Environment;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Guards one-time installation of the test subscriber.
static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to set the global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
    /// The `log` crate bridge could not be installed.
    #[error("failed to install the log bridge: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be held until the end of `main`, otherwise the last lines of a run are lost.
#[must_use = "dropping the flusher stops log delivery"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for the syncer binary.
///
/// JSON output includes the fields of the current span, so callers should enter a root span
/// carrying the environment before running.
pub fn init_tracing(environment: Environment) -> Result<LogFlusher, TracingError> {
    tracing_log::LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if environment.is_deployed() {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(writer));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing through the test harness, once per process.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer());

        // Another harness may have installed a subscriber already.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
