use repokit_core::{RepositoryError, database::PgContext};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{ConfigLoadError, DatabaseConfig};

/// Open a pool from `database` and wrap it in a persistence context.
pub async fn connect_context(
    database: &DatabaseConfig,
) -> Result<PgContext, ConfigLoadError> {
    let url = database
        .url
        .as_deref()
        .ok_or(ConfigLoadError::MissingDatabaseUrl)?;

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout)
        .connect(url)
        .await
        .map_err(RepositoryError::from)?;

    info!(
        max_connections = database.max_connections,
        acquire_timeout = ?database.acquire_timeout,
        "Connected to PostgreSQL"
    );
    Ok(PgContext::from_pool(pool))
}
