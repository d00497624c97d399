//! MySQL version constants.
//!
//! Version numbers follow MySQL's internal format: `MAJOR * 10000 + MINOR * 100 + PATCH`.

use std::num::NonZeroI32;

/// Oldest server version the syncer is tested against.
pub const MYSQL_5_7: i32 = 50700;
pub const MYSQL_8_0: i32 = 80000;

/// Returns [`true`] if the server version meets or exceeds the required version.
///
/// An unknown server version never meets any requirement.
pub fn meets_version(server_version: Option<NonZeroI32>, required_version: i32) -> bool {
    server_version.is_some_and(|v| v.get() >= required_version)
}
