use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{info, trace};
use uuid::Uuid;

use super::sql;
use crate::database::ports::context::{
    ChangeKind, ChangeRecord, PersistenceContext,
};
use crate::entity::Entity;
use crate::error::{RepositoryError, Result};
use crate::query::Query;
use crate::value::Value;

#[derive(Debug, Clone)]
struct PendingWrite {
    record: ChangeRecord,
    values: Vec<(&'static str, Value)>,
}

/// PostgreSQL persistence context backed by a `sqlx` pool.
///
/// Writes staged through the repository are buffered here and flushed in a
/// single transaction by [`PersistenceContext::save_changes`].
pub struct PgContext {
    pool: PgPool,
    pending: Mutex<Vec<PendingWrite>>,
}

impl fmt::Debug for PgContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending =
            self.pending.lock().map(|p| p.len()).unwrap_or_default();
        f.debug_struct("PgContext")
            .field("pool_size", &self.pool.size())
            .field("pending", &pending)
            .finish()
    }
}

impl PgContext {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = PgPool::connect(connection_string).await?;
        info!("Connected persistence context to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn pending(&self) -> Result<MutexGuard<'_, Vec<PendingWrite>>> {
        self.pending.lock().map_err(|_| {
            RepositoryError::Internal(
                "pending write buffer poisoned".to_string(),
            )
        })
    }

    fn stage<T: Entity>(&self, kind: ChangeKind, entity: &T) -> Result<()> {
        let write = PendingWrite {
            record: ChangeRecord::of(kind, entity),
            values: entity.values(),
        };
        trace!(
            table = T::TABLE,
            id = %write.record.id,
            ?kind,
            "staged write"
        );
        self.pending()?.push(write);
        Ok(())
    }
}

/// Decode the first column of a raw row into a [`Value`].
fn decode_first_column(row: &PgRow) -> Result<Value> {
    let column = row.columns().first().ok_or_else(|| {
        RepositoryError::InvalidSql("statement returned no columns".to_string())
    })?;

    let value: Value = match column.type_info().name() {
        "BOOL" => row.try_get::<Option<bool>, _>(0)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(0)?.into(),
        "INT4" => row.try_get::<Option<i32>, _>(0)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(0)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(0)?.into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(0)?.into(),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(0)?.into()
        }
        "UUID" => row.try_get::<Option<Uuid>, _>(0)?.into(),
        "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(0)?.into(),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(0)?
            .map(|naive| naive.and_utc())
            .into(),
        other => {
            return Err(RepositoryError::Conversion(format!(
                "unsupported column type {other} for \"{}\"",
                column.name()
            )));
        }
    };
    Ok(value)
}

#[async_trait]
impl PersistenceContext for PgContext {
    async fn load<T: Entity>(&self, query: Query<T>) -> Result<Vec<T>> {
        let mut statement = sql::select(&query);
        trace!(
            sql = statement.sql(),
            split_query = query.is_split_query(),
            "load"
        );
        let rows = statement
            .build_query_as::<T>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn load_first<T: Entity>(
        &self,
        query: Query<T>,
    ) -> Result<Option<T>> {
        let query = query.first();
        let mut statement = sql::select(&query);
        trace!(
            sql = statement.sql(),
            split_query = query.is_split_query(),
            "load_first"
        );
        let row = statement
            .build_query_as::<T>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn count<T: Entity>(&self, query: Query<T>) -> Result<u64> {
        let mut statement = sql::count(&query);
        trace!(sql = statement.sql(), "count");
        let count = statement
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|e| {
            RepositoryError::Conversion(format!(
                "negative row count {count}: {e}"
            ))
        })
    }

    async fn exists<T: Entity>(&self, query: Query<T>) -> Result<bool> {
        let mut statement = sql::exists(&query);
        trace!(sql = statement.sql(), "exists");
        let exists = statement
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn raw_column(&self, sql: &str) -> Result<Vec<Value>> {
        trace!(sql, "raw_column");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_first_column).collect()
    }

    async fn stage_insert<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Insert, &entity)
    }

    async fn stage_update<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Update, &entity)
    }

    async fn stage_delete<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Delete, &entity)
    }

    async fn pending_changes(&self) -> Result<Vec<ChangeRecord>> {
        Ok(self.pending()?.iter().map(|w| w.record.clone()).collect())
    }

    async fn save_changes(&self) -> Result<u64> {
        // Writes stay buffered until the transaction commits.
        let writes = self.pending()?.clone();
        if writes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for write in &writes {
            let record = &write.record;
            let statement = match record.kind {
                ChangeKind::Insert => {
                    Some(sql::insert(record.table, &write.values))
                }
                ChangeKind::Update => {
                    sql::update(record.table, record.id, &write.values)
                }
                ChangeKind::Delete => {
                    Some(sql::delete(record.table, record.id))
                }
            };
            let Some(mut statement) = statement else {
                continue;
            };
            trace!(sql = statement.sql(), "save_changes");
            let done = statement.build().execute(&mut *tx).await?;
            affected += done.rows_affected();
        }
        tx.commit().await?;

        let mut pending = self.pending()?;
        pending.drain(..writes.len());
        drop(pending);
        info!(writes = writes.len(), affected, "Saved staged changes");
        Ok(affected)
    }
}
