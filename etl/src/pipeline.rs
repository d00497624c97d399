//! Run-once orchestration of all configured streams.
//!
//! A run reads every watermark, extracts every stream concurrently, loads every non-empty batch
//! concurrently, notifies downstream once if anything was loaded and finally commits watermarks.
//! Commits happen strictly after the notification: a failed notification leaves every watermark
//! of the run untouched, so the next run redoes the load and the notification together.

use std::collections::HashSet;
use std::fmt::Write;

use etl_config::shared::SyncConfig;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::conversions::sanitize::RowSanitizer;
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::extract::{Extraction, SkipReason, StreamExtractor};
#[cfg(feature = "failpoints")]
use crate::failpoints::{COMMIT_WATERMARK__BEFORE_PUT, etl_fail_point};
use crate::load::ChunkedLoader;
use crate::notification::{Notifier, StreamSummary, SyncSummary};
use crate::source::Source;
use crate::state::stream::{StreamPhase, StreamSyncResult};
use crate::store::watermark::{WatermarkClient, WatermarkStore};
use crate::types::{Record, Stream, StreamId, Watermark};
use crate::{bail, etl_error};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// Structured outcome of a run, reported to the invoking scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub message: String,
}

/// Everything that happened during one run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    /// Per-stream results, in configuration order.
    pub streams: Vec<StreamSyncResult>,
    pub total_rows_loaded: usize,
    /// Whether the downstream notification was delivered.
    pub notified: bool,
    pub notification_error: Option<EtlError>,
}

impl SyncReport {
    /// Returns the result of the stream `stream_id`.
    pub fn stream(&self, stream_id: &str) -> Option<&StreamSyncResult> {
        self.streams
            .iter()
            .find(|result| result.stream_id.as_str() == stream_id)
    }

    /// Returns `true` if every stream succeeded or was skipped and the notification, when
    /// needed, was delivered.
    pub fn is_success(&self) -> bool {
        self.notification_error.is_none() && !self.streams.iter().any(|s| s.is_failed())
    }

    /// Returns every error of the run, aggregated.
    pub fn error(&self) -> Option<EtlError> {
        let mut errors: Vec<EtlError> = self
            .streams
            .iter()
            .filter(|result| result.is_failed())
            .filter_map(|result| result.error.clone())
            .collect();
        errors.extend(self.notification_error.clone());

        if errors.is_empty() {
            return None;
        }

        Some(EtlError::from(errors))
    }

    /// Builds the downstream summary of this run.
    pub fn summary(&self) -> SyncSummary {
        summarize(self.run_id, &self.streams)
    }

    /// Renders the single success or failure outcome of this run.
    pub fn outcome(&self) -> RunOutcome {
        if self.is_success() {
            return RunOutcome {
                status: RunStatus::Success,
                message: self.summary().message,
            };
        }

        let mut message = String::from("sync failed");
        let mut separator = ": ";
        for result in self.streams.iter().filter(|result| result.is_failed()) {
            let reason = result.error.as_ref().map(describe).unwrap_or_default();
            let _ = write!(message, "{separator}stream {} {reason}", result.stream_id);
            separator = "; ";
        }
        if let Some(err) = &self.notification_error {
            let _ = write!(
                message,
                "{separator}notification after {} rows {}, no watermark was committed",
                self.total_rows_loaded,
                describe(err)
            );
        }

        RunOutcome {
            status: RunStatus::Failure,
            message,
        }
    }
}

/// Syncs a fixed set of streams from a source into a destination, once per [`SyncPipeline::run`].
#[derive(Debug)]
pub struct SyncPipeline<Src, Dst, W, N> {
    streams: Vec<Stream>,
    extractor: StreamExtractor<Src>,
    loader: ChunkedLoader<Dst>,
    watermarks: WatermarkClient<W>,
    notifier: Option<N>,
}

impl<Src, Dst, W, N> SyncPipeline<Src, Dst, W, N>
where
    Src: Source + Clone + Send + Sync + 'static,
    Dst: Destination + Clone + Send + Sync + 'static,
    W: WatermarkStore,
    N: Notifier,
{
    /// Creates a pipeline for `streams`.
    ///
    /// Without a `notifier`, runs skip the downstream notification and commit right after
    /// loading.
    pub fn new(
        config: &SyncConfig,
        streams: Vec<Stream>,
        source: Src,
        destination: Dst,
        watermark_store: W,
        notifier: Option<N>,
    ) -> EtlResult<Self> {
        config.validate().map_err(|err| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid sync configuration",
                source: err
            )
        })?;

        if streams.is_empty() {
            bail!(ErrorKind::ConfigError, "At least one stream must be configured");
        }

        // Stream ids key the watermarks, two streams sharing one would overwrite each other.
        let mut ids = HashSet::with_capacity(streams.len());
        for stream in &streams {
            if !ids.insert(stream.id()) {
                bail!(
                    ErrorKind::ConfigError,
                    "Stream id is configured more than once",
                    format!("stream `{}`", stream.id())
                );
            }
        }

        let deadline = config.operation_timeout();

        Ok(Self {
            extractor: StreamExtractor::new(source, deadline),
            loader: ChunkedLoader::new(destination, config.chunk_size, deadline)?,
            watermarks: WatermarkClient::new(watermark_store).with_operation_timeout(deadline),
            streams,
            notifier,
        })
    }

    /// Runs a single sync of every stream.
    ///
    /// Never returns early: stream scoped failures are recorded on the stream's result and the
    /// remaining streams proceed. The returned report decides the run's outcome.
    pub async fn run(&self) -> SyncReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, streams = self.streams.len(), "starting sync run");

        // We read all watermarks upfront, an unreadable watermark falls back to the minimum.
        let watermarks = join_all(
            self.streams
                .iter()
                .map(|stream| self.watermarks.get(stream.id())),
        )
        .await;

        let mut results: Vec<StreamSyncResult> = self
            .streams
            .iter()
            .zip(&watermarks)
            .map(|(stream, watermark)| StreamSyncResult::pending(stream, *watermark))
            .collect();

        let extractions = self.extract_all(&watermarks).await;

        let batches: Vec<Option<Vec<Record>>> = self
            .streams
            .iter()
            .zip(results.iter_mut())
            .zip(extractions)
            .map(|((stream, result), extraction)| prepare_batch(stream, result, extraction))
            .collect();

        self.load_all(&mut results, batches).await;

        let total_rows_loaded = results
            .iter()
            .filter(|result| result.phase == StreamPhase::Loaded)
            .map(|result| result.rows_loaded)
            .sum();

        let mut report = SyncReport {
            run_id,
            streams: results,
            total_rows_loaded,
            notified: false,
            notification_error: None,
        };

        if total_rows_loaded > 0 {
            if let Some(notifier) = &self.notifier {
                let summary = report.summary();
                match notifier.notify(&summary).await {
                    Ok(()) => {
                        info!(%run_id, rows = total_rows_loaded, "notified downstream");
                        report.notified = true;
                    }
                    Err(err) => {
                        // Without a notification nothing is committed, the next run redoes
                        // both steps.
                        error!(%run_id, rows = total_rows_loaded, error = %err, "downstream notification failed, watermarks are not committed");
                        report.notification_error = Some(err);

                        return report;
                    }
                }
            }
        }

        self.commit_all(&mut report.streams).await;

        for result in &report.streams {
            info!(
                %run_id,
                stream_id = %result.stream_id,
                phase = %result.phase,
                rows = result.rows_loaded,
                watermark = %result.watermark,
                "stream finished"
            );
        }
        info!(%run_id, rows = report.total_rows_loaded, success = report.is_success(), "sync run finished");

        report
    }

    /// Extracts every stream on its own task.
    ///
    /// A panicking extraction only fails its own stream.
    async fn extract_all(&self, watermarks: &[Watermark]) -> Vec<EtlResult<Extraction>> {
        let handles: Vec<_> = self
            .streams
            .iter()
            .zip(watermarks)
            .map(|(stream, watermark)| {
                let extractor = self.extractor.clone();
                let stream = stream.clone();
                let watermark = *watermark;

                tokio::spawn(async move { extractor.extract(&stream, &watermark).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(EtlError::from))
            .collect()
    }

    /// Loads every prepared batch on its own task and records the outcome on the results.
    async fn load_all(
        &self,
        results: &mut [StreamSyncResult],
        batches: Vec<Option<Vec<Record>>>,
    ) {
        let mut indexes = Vec::new();
        let mut handles = Vec::new();
        for (index, batch) in batches.into_iter().enumerate() {
            let Some(records) = batch else {
                continue;
            };

            let loader = self.loader.clone();
            let table = results[index].destination_table.clone();
            indexes.push(index);
            handles.push(tokio::spawn(
                async move { loader.load(&table, records).await },
            ));
        }

        for (index, joined) in indexes.into_iter().zip(join_all(handles).await) {
            let result = &mut results[index];
            match joined.map_err(EtlError::from).and_then(|loaded| loaded) {
                Ok(rows) => {
                    result.rows_loaded = rows;
                    advance(result, StreamPhase::Loaded);
                }
                Err(err) => {
                    error!(stream_id = %result.stream_id, table = %result.destination_table, error = %err, "load failed, watermark is not advanced");
                    result.fail(err);
                }
            }
        }
    }

    /// Commits the watermark of every loaded stream concurrently.
    async fn commit_all(&self, results: &mut [StreamSyncResult]) {
        let commits = results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.phase == StreamPhase::Loaded)
            .map(|(index, result)| async move {
                (index, self.commit(&result.stream_id, &result.watermark).await)
            });
        let outcomes = join_all(commits).await;

        for (index, outcome) in outcomes {
            let result = &mut results[index];
            match outcome {
                Ok(()) => advance(result, StreamPhase::Committed),
                Err(err) => {
                    error!(stream_id = %result.stream_id, watermark = %result.watermark, error = %err, "failed to commit watermark");
                    result.fail(err);
                }
            }
        }
    }

    async fn commit(&self, stream_id: &StreamId, watermark: &Watermark) -> EtlResult<()> {
        #[cfg(feature = "failpoints")]
        etl_fail_point(COMMIT_WATERMARK__BEFORE_PUT, stream_id.as_str())?;

        self.watermarks.put(stream_id, watermark).await
    }
}

/// Turns the extraction of a stream into the records to load, updating the stream's result.
///
/// Returns [`None`] when the stream has nothing to load.
fn prepare_batch(
    stream: &Stream,
    result: &mut StreamSyncResult,
    extraction: EtlResult<Extraction>,
) -> Option<Vec<Record>> {
    let rows = match extraction {
        Ok(Extraction::Rows(rows)) => rows,
        Ok(Extraction::Skipped(reason)) => {
            let err = match reason {
                SkipReason::Failed(err) => err,
                SkipReason::TimedOut(timeout) => etl_error!(
                    ErrorKind::SourceQueryTimedOut,
                    "Extraction did not complete in time",
                    format!("stream `{}` exceeded {timeout:?}", stream.id())
                ),
            };
            result.error = Some(err);
            advance(result, StreamPhase::Skipped);

            return None;
        }
        Err(err) => {
            error!(stream_id = %stream.id(), error = %err, "extraction task failed");
            result.fail(err);

            return None;
        }
    };

    result.rows_extracted = rows.len();
    let Some(last) = rows.last() else {
        info!(stream_id = %stream.id(), watermark = %result.previous_watermark, "no changes since last run");
        advance(result, StreamPhase::Skipped);

        return None;
    };

    // Rows are ordered by change timestamp, so the last one bounds the whole batch.
    let candidate = last
        .get(stream.change_timestamp_column())
        .ok_or_else(|| {
            etl_error!(
                ErrorKind::InvalidData,
                "Extracted row misses its change timestamp",
                format!(
                    "column `{}` is not selected by stream `{}`",
                    stream.change_timestamp_column(),
                    stream.id()
                )
            )
        })
        .and_then(|cell| Watermark::try_from(cell));

    let prepared = candidate.and_then(|candidate| {
        let records = RowSanitizer::new(stream.clone()).sanitize_all(&rows)?;
        Ok((candidate, records))
    });

    match prepared {
        Ok((candidate, records)) => {
            if candidate <= result.previous_watermark {
                warn!(stream_id = %stream.id(), %candidate, previous = %result.previous_watermark, "new watermark does not move forward, check the query ordering");
            }

            result.watermark = candidate;
            advance(result, StreamPhase::Extracted);

            Some(records)
        }
        Err(err) => {
            error!(stream_id = %stream.id(), rows = rows.len(), error = %err, "failed to prepare extracted rows");
            result.fail(err);

            None
        }
    }
}

/// Moves `result` to `next`, failing the stream on an invalid transition.
fn advance(result: &mut StreamSyncResult, next: StreamPhase) {
    if let Err(err) = result.transition(next) {
        result.fail(err);
    }
}

fn summarize(run_id: Uuid, results: &[StreamSyncResult]) -> SyncSummary {
    let streams = results
        .iter()
        .filter(|result| !result.is_failed())
        .map(|result| StreamSummary {
            stream_id: result.stream_id.clone(),
            destination_table: result.destination_table.clone(),
            rows_loaded: result.rows_loaded,
            watermark: result.watermark,
        })
        .collect();

    SyncSummary::new(run_id, streams)
}

fn describe(err: &EtlError) -> String {
    let description = err.description().unwrap_or("failed");
    match err.detail() {
        Some(detail) => format!("({:?}): {description}, {detail}", err.kind()),
        None => format!("({:?}): {description}", err.kind()),
    }
}
