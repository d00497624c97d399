//! Chunked loading of sanitized records.
//!
//! Records of one stream are split into chunks of at most `chunk_size` records and inserted one
//! chunk after the other. Different streams load concurrently, each through its own loader call.
//! A failed chunk aborts the remaining ones. Chunks that were already inserted stay in the
//! destination: the stream's watermark does not advance, so the next run re-extracts the same
//! rows and the destination sees them again (at-least-once delivery).

use std::time::Duration;

use tracing::{debug, info};

use crate::concurrency::deadline::with_deadline;
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{LOAD_CHUNK__BEFORE_INSERT, etl_fail_point};
use crate::types::Record;
use crate::{bail, etl_error};

/// Inserts record batches into a [`Destination`] in bounded, sequential chunks.
#[derive(Debug, Clone)]
pub struct ChunkedLoader<D> {
    destination: D,
    chunk_size: usize,
    deadline: Option<Duration>,
}

impl<D> ChunkedLoader<D>
where
    D: Destination,
{
    /// Creates a loader.
    ///
    /// Fails with [`ErrorKind::ConfigError`] when `chunk_size` is zero.
    pub fn new(destination: D, chunk_size: usize, deadline: Option<Duration>) -> EtlResult<Self> {
        if chunk_size == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Chunk size must be greater than zero"
            );
        }

        Ok(Self {
            destination,
            chunk_size,
            deadline,
        })
    }

    /// Loads `records` into `table` and returns how many records were inserted.
    ///
    /// An empty batch returns `0` without calling the destination.
    pub async fn load(&self, table: &str, records: Vec<Record>) -> EtlResult<usize> {
        if records.is_empty() {
            debug!(table, "no records to load");
            return Ok(0);
        }

        let total = records.len();
        let chunks = total.div_ceil(self.chunk_size);
        let mut records = records.into_iter();

        for chunk_index in 0..chunks {
            let chunk: Vec<Record> = records.by_ref().take(self.chunk_size).collect();
            let chunk_len = chunk.len();

            #[cfg(feature = "failpoints")]
            etl_fail_point(LOAD_CHUNK__BEFORE_INSERT, table)?;

            let insert = self.destination.insert_records(table, chunk);
            match with_deadline(self.deadline, insert).await {
                Ok(result) => result?,
                Err(exceeded) => {
                    return Err(etl_error!(
                        ErrorKind::OperationTimedOut,
                        "Chunk insert did not complete in time",
                        format!(
                            "chunk {} of {chunks} for table `{table}` exceeded {:?}",
                            chunk_index + 1,
                            exceeded.timeout
                        ),
                        source: exceeded
                    ));
                }
            }

            debug!(
                table,
                chunk = chunk_index + 1,
                chunks,
                records = chunk_len,
                "chunk loaded"
            );
        }

        info!(table, records = total, chunks, destination = D::name(), "records loaded");

        Ok(total)
    }
}
