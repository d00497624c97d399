use std::fmt::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::types::{StreamId, Watermark};

/// Rows loaded by one stream, as reported downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub stream_id: StreamId,
    pub destination_table: String,
    pub rows_loaded: usize,
    /// The watermark the stream commits once the notification succeeds.
    pub watermark: Watermark,
}

/// Payload sent downstream when a run loaded new rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub total_rows: usize,
    pub streams: Vec<StreamSummary>,
    pub message: String,
}

impl SyncSummary {
    /// Builds a summary, deriving the total and the message from `streams`.
    pub fn new(run_id: Uuid, streams: Vec<StreamSummary>) -> Self {
        let total_rows = streams.iter().map(|stream| stream.rows_loaded).sum();

        let mut message = format!("synced {total_rows} rows");
        for (index, stream) in streams.iter().enumerate() {
            let separator = if index == 0 { ": " } else { ", " };
            // Writing into a `String` cannot fail.
            let _ = write!(message, "{separator}{}={}", stream.stream_id, stream.rows_loaded);
        }

        Self {
            run_id,
            total_rows,
            streams,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: &str, rows_loaded: usize, watermark: &str) -> StreamSummary {
        StreamSummary {
            stream_id: StreamId::new(id),
            destination_table: id.to_string(),
            rows_loaded,
            watermark: Watermark::parse(watermark).unwrap(),
        }
    }

    #[test]
    fn message_lists_every_stream() {
        let summary = SyncSummary::new(
            Uuid::nil(),
            vec![
                stream("orders", 3, "2024-01-01 00:00:03"),
                stream("customers", 0, "1970-01-01 00:00:00"),
            ],
        );

        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.message, "synced 3 rows: orders=3, customers=0");
    }

    #[test]
    fn serializes_watermarks_canonically() {
        let summary = SyncSummary::new(Uuid::nil(), vec![stream("orders", 3, "2024-01-01T00:00:03")]);

        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["total_rows"], 3);
        assert_eq!(value["streams"][0]["stream_id"], "orders");
        assert_eq!(value["streams"][0]["watermark"], "2024-01-01 00:00:03");
        assert_eq!(value["run_id"], "00000000-0000-0000-0000-000000000000");
    }
}
