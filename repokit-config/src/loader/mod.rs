pub mod db_url;
pub mod error;

use std::{fs, path::PathBuf, time::Duration};

use tracing::debug;

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    Config, ConfigMetadata, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_CONNECTIONS, DatabaseConfig, LoggingConfig,
};
use error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["repokit.toml", "config/repokit.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env` (when present), read the process environment and the
    /// configuration file, and compose the result.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        // A missing `.env` is fine; a malformed one is not.
        let env_file_loaded = match loaded {
            Ok(()) => true,
            Err(dotenvy::Error::Io(_)) => false,
            Err(err) => return Err(err.into()),
        };

        let mut load = self.load_with_env(EnvConfig::gather()?)?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose configuration from an already gathered environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = Vec::new();
        if config_path.is_none() {
            warnings.push(
                "No repokit.toml detected; using environment variables only"
                    .to_string(),
            );
        }

        let file_config = file_config.unwrap_or_default();
        let config = compose_config(file_config, env, config_path)?;
        if config.database.url.is_none() {
            warnings.push(
                "No database URL configured; set DATABASE_URL or [database] url"
                    .to_string(),
            );
        }
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        // Explicit and environment paths must exist; defaults are optional.
        let requested = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match requested {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| {
            ConfigLoadError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "Loaded configuration file");

        Ok((Some(file_config), Some(path)))
    }
}

/// Environment values take precedence over file values, which take
/// precedence over defaults.
fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        database: file_database,
        logging: file_logging,
    } = file;

    let database = DatabaseConfig {
        url: db_url::resolve_database_url(&env, &file_database)?,
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        acquire_timeout: env
            .database_acquire_timeout
            .or(file_database.acquire_timeout_secs.map(Duration::from_secs))
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),
    };

    let logging = LoggingConfig {
        filter: env
            .log_filter
            .clone()
            .or(file_logging.filter)
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
    };

    Ok(Config {
        database,
        logging,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    })
}
