use etl_config::load_config;
use etl_config::shared::SyncerConfig;

use crate::error::{SyncerError, SyncerResult};

/// Loads and validates the syncer configuration.
///
/// Uses the standard configuration loading mechanism from [`etl_config`] and validates the
/// resulting [`SyncerConfig`] before returning it.
pub fn load_syncer_config() -> SyncerResult<SyncerConfig> {
    let config = load_config::<SyncerConfig>().map_err(SyncerError::config)?;
    config.validate().map_err(SyncerError::config)?;

    Ok(config)
}
