use std::path::PathBuf;
use thiserror::Error;

use repokit_core::RepositoryError;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("invalid database username '{username}'")]
    InvalidDatabaseUsername { username: String },
    #[error("failed to encode database password into URL")]
    InvalidDatabasePassword,
    #[error("failed to read secret file {path}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnvValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("no database URL configured")]
    MissingDatabaseUrl,
    #[error("invalid log filter '{filter}'")]
    InvalidLogFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("tracing subscriber already initialised")]
    TracingAlreadyInitialised(#[source] tracing_subscriber::util::TryInitError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
