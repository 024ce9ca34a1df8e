//! Configuration for applications built on `repokit-core`.
//!
//! Loads database and logging settings from an optional TOML file and the
//! environment (with `.env` support), installs the tracing subscriber, and
//! opens a [`PgContext`](repokit_core::database::PgContext) from the result.

pub mod bootstrap;
pub mod loader;
pub mod models;
pub mod telemetry;
pub mod util;

pub use bootstrap::connect_context;
pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::{Config, ConfigMetadata, DatabaseConfig, LoggingConfig};
pub use telemetry::init_tracing;
