//! Named failpoints used by fault injection tests.
//!
//! Failpoints are compiled in only with the `failpoints` feature and are configured at runtime
//! through [`fail::cfg`].

use fail::fail_point;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;

/// Fails a chunk insert before it reaches the destination.
///
/// The optional parameter restricts the failure to one destination table, e.g.
/// `return(orders)`.
pub const LOAD_CHUNK__BEFORE_INSERT: &str = "load_chunk.before_insert";

/// Fails a watermark commit after the run's notification succeeded.
///
/// The optional parameter restricts the failure to one stream id.
pub const COMMIT_WATERMARK__BEFORE_PUT: &str = "commit_watermark.before_put";

/// Evaluates the failpoint `name` for the given scope (a table or stream id).
///
/// Returns an error when the failpoint is active and either carries no parameter or a
/// parameter equal to `scope`.
pub fn etl_fail_point(name: &str, scope: &str) -> EtlResult<()> {
    fail_point!(name, |parameter: Option<String>| {
        if parameter.as_deref().is_none_or(|target| target == scope) {
            return Err::<(), EtlError>(etl_error!(
                ErrorKind::FailpointTriggered,
                "An error occurred in a fail point",
                format!("The failpoint '{name}' returned an error for '{scope}'")
            ));
        }

        Ok(())
    });

    Ok(())
}
