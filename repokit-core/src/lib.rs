//! # Repokit Core
//!
//! A generic repository over a query-capable persistence context.
//!
//! ## Overview
//!
//! - **Entities**: any type implementing [`Entity`], carrying an identifier and
//!   a write-once creation timestamp ([`EntityMeta`])
//! - **Queries**: [`query::Predicate`] filters and [`query::Transform`] hooks
//!   composed into a [`query::Query`], filter first, then transform
//! - **Repository**: [`database::EntityRepository`] implemented once by
//!   [`database::GenericRepository`] for every entity and context pair
//! - **Contexts**: [`database::PgContext`] (PostgreSQL through SQLx) and
//!   [`database::MemoryContext`] (in-process)
//! - **Registration**: [`database::RepositoryRegistry`] built at startup and
//!   [`database::RepositoryScope`] opened per request
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use repokit_core::database::{
//!     EntityRepository, MemoryContext, PersistenceContext, RepositoryRegistry,
//! };
//! use repokit_core::query::{transform, Column, Query};
//! use repokit_core::{Entity, EntityMeta, Value};
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! #[derive(Debug, Clone, sqlx::FromRow)]
//! #[sqlx(rename_all = "PascalCase")]
//! struct User {
//!     #[sqlx(flatten)]
//!     meta: EntityMeta,
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Entity for User {
//!     const TABLE: &'static str = "Users";
//!     fn meta(&self) -> &EntityMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut EntityMeta { &mut self.meta }
//!     fn values(&self) -> Vec<(&'static str, Value)> {
//!         let mut values = self.meta.values();
//!         values.push(("Name", self.name.clone().into()));
//!         values.push(("Age", self.age.into()));
//!         values
//!     }
//! }
//!
//! # async fn run() -> repokit_core::Result<()> {
//! let registry =
//!     RepositoryRegistry::<MemoryContext>::new().register::<User>();
//! let scope = registry.begin_scope(Arc::new(MemoryContext::new()));
//! let users = scope.repository::<User>()?;
//! let cancel = CancellationToken::new();
//!
//! let mut ann = User {
//!     meta: EntityMeta::new(Uuid::new_v4()),
//!     name: "Ann".into(),
//!     age: 34,
//! };
//! users.add(&mut ann, &cancel).await?;
//! scope.context().save_changes().await?;
//!
//! let adults = users
//!     .get_list(
//!         Some(Column::new("Age").ge(18)),
//!         transform(|q: Query<User>| q.order_by("Name")),
//!         false,
//!         &cancel,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Database ports, adapters, the generic repository and its registry
pub mod database;
/// Base identity contract
pub mod entity;
pub mod error;
/// Composable queries and raw-SQL helpers
pub mod query;
pub mod value;

pub use entity::{CREATED_AT_COLUMN, Entity, EntityMeta, ID_COLUMN};
pub use error::{RepositoryError, Result};
pub use value::{FromValue, Value};
