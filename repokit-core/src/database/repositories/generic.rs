use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::database::ports::context::PersistenceContext;
use crate::database::ports::repository::EntityRepository;
use crate::entity::{Entity, ID_COLUMN};
use crate::error::{RepositoryError, Result};
use crate::query::{Column, Predicate, Query, RawSelect, Transform};
use crate::value::FromValue;

/// Repository for entity `T` bound to one persistence context.
///
/// Holds nothing but the context handle; every call is forwarded.
pub struct GenericRepository<T, C> {
    context: Arc<C>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, C> fmt::Debug for GenericRepository<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRepository")
            .field("entity", &std::any::type_name::<T>())
            .field("context", &std::any::type_name::<C>())
            .finish()
    }
}

impl<T, C> Clone for GenericRepository<T, C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, C: PersistenceContext> GenericRepository<T, C> {
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    fn compose(
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        split_query: bool,
    ) -> Query<T> {
        let query = Query::new().filter_opt(predicate).apply(transform);
        if split_query {
            query.as_split_query()
        } else {
            query
        }
    }
}

/// Race a store call against the cancellation token.
async fn cancellable<O, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    table: &'static str,
    call: F,
) -> Result<O>
where
    F: Future<Output = Result<O>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(table, operation, "repository call cancelled");
            Err(RepositoryError::Cancelled(format!(
                "{operation} on \"{table}\""
            )))
        }
        result = call => result,
    }
}

#[async_trait]
impl<T, C> EntityRepository<T> for GenericRepository<T, C>
where
    T: Entity,
    C: PersistenceContext,
{
    async fn get_list(
        &self,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        debug!(table = T::TABLE, split_query, "get_list");
        let query = Self::compose(predicate, transform, split_query);
        cancellable(cancel, "get_list", T::TABLE, self.context.load(query))
            .await
    }

    async fn get_single(
        &self,
        predicate: Predicate,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        debug!(table = T::TABLE, split_query, "get_single");
        let query = Self::compose(Some(predicate), transform, split_query);
        let call = self.context.load_first(query);
        cancellable(cancel, "get_single", T::TABLE, call).await
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        debug!(table = T::TABLE, %id, split_query, "get_by_id");
        // Runs over whatever rows the transform leaves, paged or not.
        let query = Self::compose(predicate, transform, split_query)
            .filter(Column::id().eq(id));
        let call = self.context.load_first(query);
        cancellable(cancel, "get_by_id", T::TABLE, call).await
    }

    async fn get_count(
        &self,
        predicate: Option<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        debug!(table = T::TABLE, "get_count");
        let query = Query::<T>::new().filter_opt(predicate);
        cancellable(cancel, "get_count", T::TABLE, self.context.count(query))
            .await
    }

    async fn select_list<R, F>(
        &self,
        projection: F,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>>
    where
        R: Send + 'static,
        F: FnMut(T) -> R + Send + 'static,
    {
        debug!(table = T::TABLE, "select_list");
        let query = Self::compose(predicate, transform, false);
        let call = self.context.load(query);
        let rows = cancellable(cancel, "select_list", T::TABLE, call).await?;
        Ok(rows.into_iter().map(projection).collect())
    }

    async fn get_single_property_value<R, F>(
        &self,
        projection: F,
        predicate: Option<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        debug!(table = T::TABLE, "get_single_property_value");
        let query = Query::<T>::new().filter_opt(predicate);
        let row = cancellable(
            cancel,
            "get_single_property_value",
            T::TABLE,
            self.context.load_first(query),
        )
        .await?;
        Ok(row.map(projection))
    }

    async fn is_exist(
        &self,
        predicate: Predicate,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        debug!(table = T::TABLE, "is_exist");
        let query = Query::<T>::new().filter(predicate);
        cancellable(cancel, "is_exist", T::TABLE, self.context.exists(query))
            .await
    }

    async fn add(
        &self,
        entity: &mut T,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // The caller's entity is stamped only once the insert is staged.
        let mut staged = entity.clone();
        let stamped = staged.meta_mut().stamp_created_at(Utc::now());
        let meta = staged.meta().clone();
        debug!(table = T::TABLE, id = %staged.id(), stamped, "staging insert");
        let call = self.context.stage_insert(staged);
        cancellable(cancel, "add", T::TABLE, call).await?;
        *entity.meta_mut() = meta;
        Ok(())
    }

    async fn remove(
        &self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Stages an update, matching the established behaviour of `remove`.
        debug!(
            table = T::TABLE,
            id = %entity.id(),
            "staging update for remove"
        );
        cancellable(
            cancel,
            "remove",
            T::TABLE,
            self.context.stage_update(entity.clone()),
        )
        .await
    }

    async fn delete(
        &self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(table = T::TABLE, id = %entity.id(), "staging delete");
        cancellable(
            cancel,
            "delete",
            T::TABLE,
            self.context.stage_delete(entity.clone()),
        )
        .await
    }

    async fn get_list_from_raw_sql<R>(
        &self,
        table: &str,
        column: &str,
        condition: Option<&str>,
        clauses: &[(&str, &str)],
        skip: Option<u64>,
        take: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>>
    where
        R: FromValue + Send + 'static,
    {
        let sql = RawSelect::new(table, column)
            .condition(condition)
            .clauses(clauses)
            .skip(skip)
            .take(take)
            .render()?;
        debug!(
            table = T::TABLE,
            raw_table = table,
            column,
            "get_list_from_raw_sql"
        );
        trace!(sql = %sql, "get_list_from_raw_sql");

        let values = cancellable(
            cancel,
            "get_list_from_raw_sql",
            T::TABLE,
            self.context.raw_column(&sql),
        )
        .await?;
        values.into_iter().map(R::from_value).collect()
    }

    async fn get_total_count_from_raw_sql(
        &self,
        table: &str,
        condition: Option<&str>,
        clauses: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let sql = RawSelect::new(table, ID_COLUMN)
            .condition(condition)
            .clauses(clauses)
            .render()?;
        debug!(
            table = T::TABLE,
            raw_table = table,
            "get_total_count_from_raw_sql"
        );
        trace!(sql = %sql, "get_total_count_from_raw_sql");

        let rows = cancellable(
            cancel,
            "get_total_count_from_raw_sql",
            T::TABLE,
            self.context.raw_column(&sql),
        )
        .await?;
        Ok(rows.len() as u64)
    }
}
