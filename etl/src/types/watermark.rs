use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Serialize, Serializer};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::types::Cell;
use crate::{bail, etl_error};

/// Canonical textual form of a watermark, also used for every sanitized timestamp.
pub const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted when parsing a timestamp without an explicit offset.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// The last change timestamp known to be fully synced for a stream.
///
/// Watermarks are truncated to whole seconds and render as `YYYY-MM-DD HH:MM:SS`, whatever form
/// the source used for the same instant. The minimum watermark is the Unix epoch, so a stream
/// without a stored watermark is read in full.
///
/// Extraction filters with a strictly greater than comparison. Rows sharing the exact second of
/// a previously committed watermark are therefore never read again, which is a known limitation
/// of second granularity watermarks. Switching to `>=` would instead reload the boundary rows on
/// every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(NaiveDateTime);

impl Watermark {
    /// Returns the minimum watermark, `1970-01-01 00:00:00`.
    pub fn min() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH.naive_utc())
    }

    /// Creates a watermark from a naive timestamp, dropping sub-second precision.
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self(timestamp.with_nanosecond(0).unwrap_or(timestamp))
    }

    /// Parses a watermark from any supported textual timestamp.
    ///
    /// Accepts the canonical form, ISO 8601 with a `T` separator, fractional seconds, RFC 3339
    /// offsets (converted to UTC) and bare dates (midnight).
    pub fn parse(value: &str) -> EtlResult<Self> {
        let value = value.trim();

        if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self::new(timestamp.with_timezone(&Utc).naive_utc()));
        }

        let normalized = value.replacen('T', " ", 1);
        for format in NAIVE_TIMESTAMP_FORMATS {
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(&normalized, format) {
                return Ok(Self::new(timestamp));
            }
        }

        match NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
            Ok(date) => Ok(Self::new(date.and_time(NaiveTime::MIN))),
            Err(err) => Err(etl_error!(
                ErrorKind::ConversionError,
                "Watermark is not a valid timestamp",
                format!("value `{value}` could not be parsed"),
                source: err
            )),
        }
    }

    /// Returns the underlying timestamp, as bound to extraction queries.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::min()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_TIMESTAMP_FORMAT))
    }
}

impl FromStr for Watermark {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl TryFrom<&Cell> for Watermark {
    type Error = EtlError;

    fn try_from(cell: &Cell) -> Result<Self, Self::Error> {
        match cell {
            Cell::DateTime(timestamp) => Ok(Self::new(*timestamp)),
            Cell::TimestampTz(timestamp) => Ok(Self::new(timestamp.naive_utc())),
            Cell::Date(date) => Ok(Self::new(date.and_time(NaiveTime::MIN))),
            Cell::String(value) => Self::parse(value),
            Cell::Null => bail!(
                ErrorKind::InvalidData,
                "Change timestamp is null",
                "the last extracted row has no change timestamp"
            ),
            other => bail!(
                ErrorKind::InvalidData,
                "Change timestamp has an unsupported type",
                format!("cannot derive a watermark from {other:?}")
            ),
        }
    }
}
