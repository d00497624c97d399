//! Per-stream extraction with failure isolation.
//!
//! A failing or hung extraction must not abort sibling streams of the same run. Instead of
//! swallowing errors into an empty result, [`StreamExtractor::extract`] returns an explicit
//! [`Extraction::Skipped`] that the pipeline consumes: the stream contributes no rows and its
//! watermark stays where it was, so the next run retries the same window.

use std::time::Duration;

use tracing::{debug, warn};

use crate::concurrency::deadline::with_deadline;
use crate::error::EtlError;
use crate::source::Source;
use crate::types::{Row, Stream, Watermark};

/// Why an extraction produced no usable rows.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The query failed.
    Failed(EtlError),
    /// The query did not complete within the operation deadline.
    TimedOut(Duration),
}

/// Outcome of extracting one stream.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// The query ran. The rows may be empty when nothing changed since the watermark.
    Rows(Vec<Row>),
    /// The query did not run to completion. The stream is skipped for this run.
    Skipped(SkipReason),
}

impl Extraction {
    /// Returns the extracted rows, or an empty slice when skipped.
    pub fn rows(&self) -> &[Row] {
        match self {
            Extraction::Rows(rows) => rows,
            Extraction::Skipped(_) => &[],
        }
    }
}

/// Runs stream extraction queries against a shared [`Source`].
#[derive(Debug, Clone)]
pub struct StreamExtractor<S> {
    source: S,
    deadline: Option<Duration>,
}

impl<S> StreamExtractor<S>
where
    S: Source,
{
    /// Creates an extractor bounding every query by `deadline`, when set.
    pub fn new(source: S, deadline: Option<Duration>) -> Self {
        Self { source, deadline }
    }

    /// Fetches the rows of `stream` changed strictly after `watermark`.
    pub async fn extract(&self, stream: &Stream, watermark: &Watermark) -> Extraction {
        let fetch = self.source.fetch_rows(stream.source_query(), watermark);

        match with_deadline(self.deadline, fetch).await {
            Ok(Ok(rows)) => {
                debug!(stream_id = %stream.id(), rows = rows.len(), %watermark, "extracted rows");
                Extraction::Rows(rows)
            }
            Ok(Err(err)) => {
                warn!(stream_id = %stream.id(), %watermark, error = %err, "extraction failed, skipping stream for this run");
                Extraction::Skipped(SkipReason::Failed(err))
            }
            Err(exceeded) => {
                warn!(stream_id = %stream.id(), %watermark, timeout = ?exceeded.timeout, "extraction timed out, skipping stream for this run");
                Extraction::Skipped(SkipReason::TimedOut(exceeded.timeout))
            }
        }
    }
}
