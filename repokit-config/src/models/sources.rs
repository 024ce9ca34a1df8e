use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ConfigLoadError;
use crate::util::{non_blank_var, parse_duration, parse_value};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_url_file: Option<PathBuf>,
    pub database_host: Option<String>,
    pub database_port: Option<u16>,
    pub database_user: Option<String>,
    pub database_name: Option<String>,
    pub database_password: Option<String>,
    pub database_password_file: Option<PathBuf>,
    pub database_max_connections: Option<u32>,
    pub database_acquire_timeout: Option<Duration>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    /// Read the process environment. Malformed numeric or duration values
    /// are errors rather than silently ignored.
    pub fn gather() -> Result<Self, ConfigLoadError> {
        Ok(Self {
            config_path: non_blank_var("REPOKIT_CONFIG").map(PathBuf::from),
            database_url: non_blank_var("DATABASE_URL"),
            database_url_file: non_blank_var("DATABASE_URL_FILE")
                .map(PathBuf::from),
            database_host: non_blank_var("DATABASE_HOST"),
            database_port: non_blank_var("DATABASE_PORT")
                .map(|raw| parse_value("DATABASE_PORT", &raw))
                .transpose()?,
            database_user: non_blank_var("DATABASE_USER"),
            database_name: non_blank_var("DATABASE_NAME"),
            database_password: non_blank_var("DATABASE_PASSWORD"),
            database_password_file: non_blank_var("DATABASE_PASSWORD_FILE")
                .map(PathBuf::from),
            database_max_connections: non_blank_var("DATABASE_MAX_CONNECTIONS")
                .map(|raw| parse_value("DATABASE_MAX_CONNECTIONS", &raw))
                .transpose()?,
            database_acquire_timeout: non_blank_var("DATABASE_ACQUIRE_TIMEOUT")
                .map(|raw| parse_duration("DATABASE_ACQUIRE_TIMEOUT", &raw))
                .transpose()?,
            log_filter: non_blank_var("REPOKIT_LOG"),
        })
    }
}
