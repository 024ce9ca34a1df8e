use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{ConfigLoadError, LoggingConfig};

/// Install the global subscriber: `RUST_LOG` when set, otherwise the
/// configured filter, printed through the `fmt` layer.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigLoadError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.filter).map_err(|source| {
            ConfigLoadError::InvalidLogFilter {
                filter: logging.filter.clone(),
                source,
            }
        })?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(ConfigLoadError::TracingAlreadyInitialised)
}
