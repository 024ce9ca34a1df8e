//! In-process persistence context.
//!
//! Queries are evaluated against entity values with the same semantics the
//! Postgres context renders to SQL (three-valued predicates, `NULLS LAST`
//! for ascending order). Raw SQL cannot be executed here: statements are
//! recorded and answered from results registered with
//! [`MemoryContext::register_raw_result`].

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{info, trace};
use uuid::Uuid;

use crate::database::ports::context::{
    ChangeKind, ChangeRecord, PersistenceContext,
};
use crate::entity::Entity;
use crate::error::{RepositoryError, Result};
use crate::query::{OrderBy, Query, SortOrder};
use crate::value::Value;

type Tables = HashMap<TypeId, Box<dyn Any + Send + Sync>>;
type ApplyFn = Box<dyn FnOnce(&mut Tables) -> Result<u64> + Send>;

/// One query observed by the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTrace {
    pub operation: &'static str,
    pub table: &'static str,
    pub split_query: bool,
}

struct PendingChange {
    record: ChangeRecord,
    // Checks the target table without touching its rows.
    prepare: fn(&mut Tables) -> Result<()>,
    apply: ApplyFn,
}

#[derive(Default)]
struct MemoryState {
    tables: Tables,
    pending: Vec<PendingChange>,
    raw_results: HashMap<String, Vec<Value>>,
    executed_sql: Vec<String>,
    executed_queries: Vec<QueryTrace>,
}

/// Persistence context holding entities in memory.
#[derive(Default)]
pub struct MemoryContext {
    state: Mutex<MemoryState>,
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryContext");
        if let Ok(state) = self.state.lock() {
            debug
                .field("tables", &state.tables.len())
                .field("pending", &state.pending.len())
                .field("executed_sql", &state.executed_sql.len());
        }
        debug.finish()
    }
}

fn rows<T: Entity>(tables: &Tables) -> &[T] {
    tables
        .get(&TypeId::of::<T>())
        .and_then(|table| table.downcast_ref::<Vec<T>>())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn rows_mut<T: Entity>(tables: &mut Tables) -> Result<&mut Vec<T>> {
    tables
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Vec::<T>::new()))
        .downcast_mut::<Vec<T>>()
        .ok_or_else(|| {
            RepositoryError::Internal(format!(
                "table \"{}\" has the wrong row type",
                T::TABLE
            ))
        })
}

fn ensure_table<T: Entity>(tables: &mut Tables) -> Result<()> {
    rows_mut::<T>(tables).map(|_| ())
}

fn position_of<T: Entity>(rows: &[T], id: Uuid) -> Option<usize> {
    rows.iter().position(|row| row.id() == id)
}

/// Postgres default ordering: `NULL` sorts after every value.
fn compare_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

fn sort_key<T: Entity>(row: &T, column: &str) -> Result<Value> {
    row.column_value(column).ok_or_else(|| {
        RepositoryError::InvalidQuery(format!(
            "column \"{column}\" does not exist on \"{}\"",
            T::TABLE
        ))
    })
}

fn sort_rows<'a, T: Entity>(
    rows: Vec<&'a T>,
    ordering: &[OrderBy],
) -> Result<Vec<&'a T>> {
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows {
        let keys = ordering
            .iter()
            .map(|order| sort_key(row, &order.column))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((keys, row));
    }
    // Stable, so ties keep their incoming order.
    keyed.sort_by(|(a, _), (b, _)| {
        for ((left, right), order) in a.iter().zip(b).zip(ordering) {
            let ordering = compare_nulls_last(left, right);
            let ordering = match order.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

fn to_usize(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

/// Each stage filters, orders, skips and takes the previous stage's rows.
fn run_query<T: Entity>(rows: &[T], query: &Query<T>) -> Result<Vec<T>> {
    let mut current: Vec<&T> = rows.iter().collect();
    for stage in query.stages() {
        let mut matched = Vec::with_capacity(current.len());
        'rows: for row in current {
            for filter in stage.filters() {
                if !filter.matches(row)? {
                    continue 'rows;
                }
            }
            matched.push(row);
        }

        if !stage.ordering().is_empty() {
            matched = sort_rows(matched, stage.ordering())?;
        }

        let skip = stage.skip().map_or(0, to_usize);
        let take = stage.take().map_or(usize::MAX, to_usize);
        current = matched.into_iter().skip(skip).take(take).collect();
    }
    Ok(current.into_iter().cloned().collect())
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| {
            RepositoryError::Internal(
                "memory context state poisoned".to_string(),
            )
        })
    }

    /// Store entities directly, bypassing staging. Duplicate ids are kept.
    pub fn seed<T: Entity>(
        &self,
        entities: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        let mut state = self.state()?;
        rows_mut::<T>(&mut state.tables)?.extend(entities);
        Ok(())
    }

    /// Committed rows of `T` in storage order.
    pub fn snapshot<T: Entity>(&self) -> Result<Vec<T>> {
        Ok(rows::<T>(&self.state()?.tables).to_vec())
    }

    /// Answer `sql` with `rows` whenever it is executed.
    pub fn register_raw_result(
        &self,
        sql: impl Into<String>,
        rows: Vec<Value>,
    ) -> Result<()> {
        self.state()?.raw_results.insert(sql.into(), rows);
        Ok(())
    }

    pub fn executed_sql(&self) -> Result<Vec<String>> {
        Ok(self.state()?.executed_sql.clone())
    }

    pub fn executed_queries(&self) -> Result<Vec<QueryTrace>> {
        Ok(self.state()?.executed_queries.clone())
    }

    fn read<T: Entity>(
        &self,
        operation: &'static str,
        query: &Query<T>,
    ) -> Result<Vec<T>> {
        let mut state = self.state()?;
        state.executed_queries.push(QueryTrace {
            operation,
            table: T::TABLE,
            split_query: query.is_split_query(),
        });
        trace!(table = T::TABLE, operation, ?query, "memory read");
        run_query(rows::<T>(&state.tables), query)
    }

    fn stage<T: Entity>(&self, kind: ChangeKind, entity: T) -> Result<()> {
        let record = ChangeRecord::of(kind, &entity);
        let id = record.id;
        let apply: ApplyFn = match kind {
            ChangeKind::Insert => Box::new(move |tables: &mut Tables| {
                rows_mut::<T>(tables)?.push(entity);
                Ok(1)
            }),
            ChangeKind::Update => Box::new(move |tables: &mut Tables| {
                let rows = rows_mut::<T>(tables)?;
                Ok(match position_of(rows, id) {
                    Some(index) => {
                        rows[index] = entity;
                        1
                    }
                    None => 0,
                })
            }),
            ChangeKind::Delete => Box::new(move |tables: &mut Tables| {
                let rows = rows_mut::<T>(tables)?;
                Ok(match position_of(rows, id) {
                    Some(index) => {
                        rows.remove(index);
                        1
                    }
                    None => 0,
                })
            }),
        };
        trace!(table = T::TABLE, %id, ?kind, "staged write");
        self.state()?.pending.push(PendingChange {
            record,
            prepare: ensure_table::<T>,
            apply,
        });
        Ok(())
    }
}

#[async_trait]
impl PersistenceContext for MemoryContext {
    async fn load<T: Entity>(&self, query: Query<T>) -> Result<Vec<T>> {
        self.read("load", &query)
    }

    async fn load_first<T: Entity>(
        &self,
        query: Query<T>,
    ) -> Result<Option<T>> {
        let rows = self.read("load_first", &query.first())?;
        Ok(rows.into_iter().next())
    }

    async fn count<T: Entity>(&self, query: Query<T>) -> Result<u64> {
        let rows = self.read("count", &query)?;
        Ok(rows.len() as u64)
    }

    async fn exists<T: Entity>(&self, query: Query<T>) -> Result<bool> {
        let rows = self.read("exists", &query)?;
        Ok(!rows.is_empty())
    }

    async fn raw_column(&self, sql: &str) -> Result<Vec<Value>> {
        let mut state = self.state()?;
        state.executed_sql.push(sql.to_string());
        trace!(sql, "memory raw_column");
        state.raw_results.get(sql).cloned().ok_or_else(|| {
            RepositoryError::InvalidSql(format!(
                "no result registered for `{sql}`"
            ))
        })
    }

    async fn stage_insert<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Insert, entity)
    }

    async fn stage_update<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Update, entity)
    }

    async fn stage_delete<T: Entity>(&self, entity: T) -> Result<()> {
        self.stage(ChangeKind::Delete, entity)
    }

    async fn pending_changes(&self) -> Result<Vec<ChangeRecord>> {
        Ok(self
            .state()?
            .pending
            .iter()
            .map(|change| change.record.clone())
            .collect())
    }

    async fn save_changes(&self) -> Result<u64> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        // Nothing is applied or drained unless every change can be.
        for change in &state.pending {
            (change.prepare)(&mut state.tables)?;
        }

        let writes = state.pending.len();
        let mut affected = 0;
        for change in state.pending.drain(..) {
            affected += (change.apply)(&mut state.tables)?;
        }
        info!(writes, affected, "Saved staged changes");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityMeta;

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Note {
        #[sqlx(flatten)]
        meta: EntityMeta,
    }

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Pin {
        #[sqlx(flatten)]
        meta: EntityMeta,
    }

    macro_rules! bare_entity {
        ($ty:ident, $table:literal) => {
            impl Entity for $ty {
                const TABLE: &'static str = $table;

                fn meta(&self) -> &EntityMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut EntityMeta {
                    &mut self.meta
                }

                fn values(&self) -> Vec<(&'static str, Value)> {
                    self.meta.values()
                }
            }
        };
    }

    bare_entity!(Note, "Notes");
    bare_entity!(Pin, "Pins");

    fn note() -> Note {
        Note { meta: EntityMeta::new(Uuid::new_v4()) }
    }

    fn pin() -> Pin {
        Pin { meta: EntityMeta::new(Uuid::new_v4()) }
    }

    #[tokio::test]
    async fn failed_save_keeps_every_change_staged() -> Result<()> {
        let context = MemoryContext::new();
        context
            .state()?
            .tables
            .insert(TypeId::of::<Pin>(), Box::new(0u8));

        context.stage_insert(note()).await?;
        context.stage_insert(pin()).await?;

        let result = context.save_changes().await;
        assert!(matches!(result, Err(RepositoryError::Internal(_))));
        assert!(context.snapshot::<Note>()?.is_empty());
        assert_eq!(context.pending_changes().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn save_applies_changes_in_staging_order() -> Result<()> {
        let context = MemoryContext::new();
        let first = note();
        context.stage_insert(first.clone()).await?;
        context.stage_delete(first).await?;
        context.stage_insert(pin()).await?;

        assert_eq!(context.save_changes().await?, 3);
        assert!(context.snapshot::<Note>()?.is_empty());
        assert_eq!(context.snapshot::<Pin>()?.len(), 1);
        assert!(context.pending_changes().await?.is_empty());
        Ok(())
    }
}
