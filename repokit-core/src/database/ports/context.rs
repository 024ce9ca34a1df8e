use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::Result;
use crate::query::Query;
use crate::value::Value;

/// Kind of write staged against a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Summary of one staged, not yet saved, write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub table: &'static str,
    pub id: Uuid,
}

impl ChangeRecord {
    pub fn of<T: Entity>(kind: ChangeKind, entity: &T) -> Self {
        Self {
            kind,
            table: T::TABLE,
            id: entity.id(),
        }
    }
}

/// Unit-of-work scope the repository forwards to.
///
/// Reads execute immediately. Writes are staged and only reach the store
/// when the owner of the context calls [`PersistenceContext::save_changes`].
/// A context belongs to one logical scope and is not meant to serve
/// overlapping operations.
#[async_trait]
pub trait PersistenceContext: Send + Sync + 'static {
    async fn load<T: Entity>(&self, query: Query<T>) -> Result<Vec<T>>;

    async fn load_first<T: Entity>(
        &self,
        query: Query<T>,
    ) -> Result<Option<T>>;

    async fn count<T: Entity>(&self, query: Query<T>) -> Result<u64>;

    async fn exists<T: Entity>(&self, query: Query<T>) -> Result<bool>;

    /// Execute a raw single-column statement and return the first column of
    /// every row.
    async fn raw_column(&self, sql: &str) -> Result<Vec<Value>>;

    async fn stage_insert<T: Entity>(&self, entity: T) -> Result<()>;

    async fn stage_update<T: Entity>(&self, entity: T) -> Result<()>;

    async fn stage_delete<T: Entity>(&self, entity: T) -> Result<()>;

    async fn pending_changes(&self) -> Result<Vec<ChangeRecord>>;

    /// Flush staged writes in order. Returns the number of affected rows.
    async fn save_changes(&self) -> Result<u64>;
}
