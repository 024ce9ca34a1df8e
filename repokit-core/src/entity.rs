//! Base identity contract shared by every persisted type.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::value::Value;

/// Column holding the entity identifier.
pub const ID_COLUMN: &str = "Id";
/// Column holding the insertion timestamp.
pub const CREATED_AT_COLUMN: &str = "CreatedAt";

/// Identity and creation timestamp carried by every entity.
///
/// The identifier is fixed at construction. `created_at` starts out empty and
/// is stamped once, by the repository's add path.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct EntityMeta {
    id: Uuid,
    created_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: None,
        }
    }

    /// Rehydrate metadata read back from storage.
    pub fn restore(id: Uuid, created_at: Option<DateTime<Utc>>) -> Self {
        Self { id, created_at }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Set the creation timestamp unless one is already present.
    ///
    /// Returns `true` when the timestamp was written.
    pub(crate) fn stamp_created_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.created_at.is_some() {
            return false;
        }
        self.created_at = Some(now);
        true
    }

    /// The `Id` and `CreatedAt` column pairs, in that order.
    pub fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            (ID_COLUMN, Value::Uuid(self.id)),
            (CREATED_AT_COLUMN, self.created_at.into()),
        ]
    }
}

/// A persisted type addressable by the generic repository.
///
/// Implementors embed an [`EntityMeta`] and describe their columns through
/// [`Entity::values`]; the Postgres context decodes rows with the type's
/// `FromRow` implementation.
///
/// ```
/// use repokit_core::{Entity, EntityMeta, Value};
///
/// #[derive(Debug, Clone, sqlx::FromRow)]
/// #[sqlx(rename_all = "PascalCase")]
/// struct User {
///     #[sqlx(flatten)]
///     meta: EntityMeta,
///     name: String,
///     age: i32,
/// }
///
/// impl Entity for User {
///     const TABLE: &'static str = "Users";
///
///     fn meta(&self) -> &EntityMeta {
///         &self.meta
///     }
///
///     fn meta_mut(&mut self) -> &mut EntityMeta {
///         &mut self.meta
///     }
///
///     fn values(&self) -> Vec<(&'static str, Value)> {
///         let mut values = self.meta.values();
///         values.push(("Name", self.name.clone().into()));
///         values.push(("Age", self.age.into()));
///         values
///     }
/// }
/// ```
pub trait Entity:
    for<'r> sqlx::FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static
{
    /// Unqualified table name inside the `public` schema.
    const TABLE: &'static str;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Every stored column with its current value, `Id` first.
    fn values(&self) -> Vec<(&'static str, Value)>;

    fn id(&self) -> Uuid {
        self.meta().id()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at()
    }

    /// Value of a single column, or `None` if the entity has no such column.
    fn column_value(&self, column: &str) -> Option<Value> {
        self.values()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}
