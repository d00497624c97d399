use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::types::{Stream, StreamId, Watermark};

/// Phase of a stream within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    /// The watermark was read, extraction has not finished.
    Pending,
    /// Rows were extracted and sanitized.
    Extracted,
    /// Every chunk was inserted into the destination.
    Loaded,
    /// The new watermark was persisted.
    Committed,
    /// Nothing was loaded and the watermark is unchanged, either because nothing changed since
    /// the last run or because extraction did not complete.
    Skipped,
    /// The stream failed after extraction. The watermark is unchanged.
    Failed,
}

impl StreamPhase {
    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamPhase::Committed | StreamPhase::Skipped | StreamPhase::Failed
        )
    }

    /// Returns `true` if a stream in this phase may move to `next`.
    pub fn can_transition_to(&self, next: StreamPhase) -> bool {
        use StreamPhase::*;

        matches!(
            (self, next),
            (Pending, Extracted | Skipped | Failed)
                | (Extracted, Loaded | Skipped | Failed)
                | (Loaded, Committed | Failed)
        )
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamPhase::Pending => "pending",
            StreamPhase::Extracted => "extracted",
            StreamPhase::Loaded => "loaded",
            StreamPhase::Committed => "committed",
            StreamPhase::Skipped => "skipped",
            StreamPhase::Failed => "failed",
        };

        f.write_str(name)
    }
}

/// Outcome of one stream within a run.
#[derive(Debug, Clone)]
pub struct StreamSyncResult {
    pub stream_id: StreamId,
    pub destination_table: String,
    pub phase: StreamPhase,
    pub rows_extracted: usize,
    pub rows_loaded: usize,
    /// Watermark read at the start of the run.
    pub previous_watermark: Watermark,
    /// Candidate watermark, persisted only once the stream reaches [`StreamPhase::Committed`].
    pub watermark: Watermark,
    pub error: Option<EtlError>,
}

impl StreamSyncResult {
    /// Creates a pending result for `stream` starting at `previous_watermark`.
    pub fn pending(stream: &Stream, previous_watermark: Watermark) -> Self {
        Self {
            stream_id: stream.id().clone(),
            destination_table: stream.destination_table().to_string(),
            phase: StreamPhase::Pending,
            rows_extracted: 0,
            rows_loaded: 0,
            previous_watermark,
            watermark: previous_watermark,
            error: None,
        }
    }

    /// Moves the stream to `next`.
    pub fn transition(&mut self, next: StreamPhase) -> EtlResult<()> {
        if !self.phase.can_transition_to(next) {
            bail!(
                ErrorKind::InvalidState,
                "Invalid stream phase transition",
                format!("stream `{}` cannot move from {} to {next}", self.stream_id, self.phase)
            );
        }

        self.phase = next;

        Ok(())
    }

    /// Marks the stream as failed with `error`, resetting its candidate watermark.
    pub fn fail(&mut self, error: EtlError) {
        self.phase = StreamPhase::Failed;
        self.watermark = self.previous_watermark;
        self.error = Some(error);
    }

    pub fn is_failed(&self) -> bool {
        self.phase == StreamPhase::Failed
    }
}
