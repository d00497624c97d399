//! Configuration types and loading for the incremental syncer.
//!
//! Configuration is assembled from a base file, an environment specific file and
//! `APP_`-prefixed environment variables. See [`load_config`] for the exact layering.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from_dir};
