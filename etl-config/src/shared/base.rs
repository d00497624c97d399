use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// No stream is configured, so a run would have nothing to do.
    #[error("at least one stream must be configured")]
    NoStreams,
    /// Two streams share the same identifier, which is also their watermark key.
    #[error("stream id `{0}` is configured more than once")]
    DuplicateStreamId(String),
    /// A stream declares the same destination field twice.
    #[error("stream `{stream_id}` declares field `{field}` more than once")]
    DuplicateField { stream_id: String, field: String },
    /// The source query does not bind the watermark exactly once.
    #[error(
        "stream `{stream_id}` source query must contain exactly one `?` watermark placeholder, found {found}"
    )]
    InvalidWatermarkPlaceholder { stream_id: String, found: usize },
}
