use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::Result;
use crate::query::{Predicate, Transform};
use crate::value::FromValue;

/// Operations available for any entity type.
///
/// Every call forwards to the bound persistence context. Optional predicates
/// are applied first, then the optional transform. Lookups that find nothing
/// return `Ok(None)`; store failures propagate unchanged. A cancelled token
/// aborts the in-flight store call with `RepositoryError::Cancelled`.
#[async_trait]
pub trait EntityRepository<T: Entity>: Send + Sync {
    async fn get_list(
        &self,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>;

    /// First match with no implied ordering beyond what the transform adds.
    async fn get_single(
        &self,
        predicate: Predicate,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>;

    /// The identifier condition runs over the rows the transform produces,
    /// so a paging transform can exclude the entity. Duplicate identifiers
    /// yield the first match.
    async fn get_by_id(
        &self,
        id: Uuid,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        split_query: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>;

    async fn get_count(
        &self,
        predicate: Option<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<u64>;

    async fn select_list<R, F>(
        &self,
        projection: F,
        predicate: Option<Predicate>,
        transform: Option<Transform<T>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>>
    where
        R: Send + 'static,
        F: FnMut(T) -> R + Send + 'static;

    async fn get_single_property_value<R, F>(
        &self,
        projection: F,
        predicate: Option<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
        F: FnOnce(T) -> R + Send + 'static;

    async fn is_exist(
        &self,
        predicate: Predicate,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Stamp `CreatedAt` if unset and stage the entity for insertion.
    ///
    /// The stamp is written back to `entity` only once the insert is staged.
    async fn add(
        &self,
        entity: &mut T,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Stage the entity as **updated**. Nothing is deleted; use
    /// [`EntityRepository::delete`] to stage a deletion.
    async fn remove(
        &self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn delete(
        &self,
        entity: &T,
        cancel: &CancellationToken,
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
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
        R: FromValue + Send + 'static;

    /// Counts the materialized `Id` rows rather than issuing `COUNT(*)`.
    async fn get_total_count_from_raw_sql(
        &self,
        table: &str,
        condition: Option<&str>,
        clauses: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<u64>;
}
