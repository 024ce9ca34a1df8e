//! Startup registration of entity repositories and per-request resolution.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use repokit_core::{Entity, EntityMeta, Value};
//! # #[derive(Debug, Clone, sqlx::FromRow)]
//! # struct User { #[sqlx(flatten)] meta: EntityMeta }
//! # impl Entity for User {
//! #     const TABLE: &'static str = "Users";
//! #     fn meta(&self) -> &EntityMeta { &self.meta }
//! #     fn meta_mut(&mut self) -> &mut EntityMeta { &mut self.meta }
//! #     fn values(&self) -> Vec<(&'static str, Value)> { self.meta.values() }
//! # }
//! use repokit_core::database::{PgContext, RepositoryRegistry};
//!
//! # async fn run(pool: sqlx::PgPool) -> repokit_core::Result<()> {
//! let registry = RepositoryRegistry::<PgContext>::new().register::<User>();
//!
//! // once per request
//! let scope = registry.begin_scope(Arc::new(PgContext::from_pool(pool)));
//! let users = scope.repository::<User>()?;
//! # Ok(())
//! # }
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::database::ports::context::PersistenceContext;
use crate::database::repositories::GenericRepository;
use crate::entity::Entity;
use crate::error::{RepositoryError, Result};

type Instance = Arc<dyn Any + Send + Sync>;
type Factory<C> = Arc<dyn Fn(Arc<C>) -> Instance + Send + Sync>;

struct Registration<C> {
    entity: &'static str,
    table: &'static str,
    factory: Factory<C>,
}

impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            table: self.table,
            factory: Arc::clone(&self.factory),
        }
    }
}

/// Application-lifetime set of entity types resolvable against context `C`.
///
/// Each entity is registered explicitly; resolution only ever produces
/// `GenericRepository<T, C>` for a type that was registered.
pub struct RepositoryRegistry<C> {
    registrations: Arc<HashMap<TypeId, Registration<C>>>,
}

impl<C> Clone for RepositoryRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            registrations: Arc::clone(&self.registrations),
        }
    }
}

impl<C> Default for RepositoryRegistry<C> {
    fn default() -> Self {
        Self {
            registrations: Arc::new(HashMap::new()),
        }
    }
}

impl<C> fmt::Debug for RepositoryRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("context", &type_name::<C>())
            .field("entities", &self.entity_names())
            .finish()
    }
}

impl<C> RepositoryRegistry<C> {
    fn entity_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> =
            self.registrations.values().map(|r| r.entity).collect();
        names.sort_unstable();
        names
    }
}

impl<C: PersistenceContext> RepositoryRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the repository for entity `T`. Registering `T` again replaces
    /// the earlier entry.
    pub fn register<T: Entity>(mut self) -> Self {
        let factory: Factory<C> = Arc::new(|context: Arc<C>| -> Instance {
            Arc::new(GenericRepository::<T, C>::new(context))
        });
        let registration = Registration {
            entity: type_name::<T>(),
            table: T::TABLE,
            factory,
        };

        let previous = Arc::make_mut(&mut self.registrations)
            .insert(TypeId::of::<T>(), registration);
        if previous.is_some() {
            warn!(
                entity = type_name::<T>(),
                "Repository registered twice; replacing"
            );
        } else {
            debug!(
                entity = type_name::<T>(),
                table = T::TABLE,
                "Registered repository"
            );
        }
        self
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Tables of every registered entity, sorted.
    pub fn registered_tables(&self) -> Vec<&'static str> {
        let mut tables: Vec<_> =
            self.registrations.values().map(|r| r.table).collect();
        tables.sort_unstable();
        tables
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Open a scope bound to one context instance, typically one per request.
    pub fn begin_scope(&self, context: Arc<C>) -> RepositoryScope<C> {
        RepositoryScope {
            context,
            registrations: Arc::clone(&self.registrations),
            resolved: Mutex::new(HashMap::new()),
        }
    }
}

/// Resolved repositories for one scope.
///
/// Each entity's repository is built on first use and shared for the rest of
/// the scope.
pub struct RepositoryScope<C> {
    context: Arc<C>,
    registrations: Arc<HashMap<TypeId, Registration<C>>>,
    resolved: Mutex<HashMap<TypeId, Instance>>,
}

impl<C> fmt::Debug for RepositoryScope<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved =
            self.resolved.lock().map(|r| r.len()).unwrap_or_default();
        f.debug_struct("RepositoryScope")
            .field("context", &type_name::<C>())
            .field("registered", &self.registrations.len())
            .field("resolved", &resolved)
            .finish()
    }
}

impl<C: PersistenceContext> RepositoryScope<C> {
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn repository<T: Entity>(
        &self,
    ) -> Result<Arc<GenericRepository<T, C>>> {
        let key = TypeId::of::<T>();
        let mut resolved = self.resolved.lock().map_err(|_| {
            RepositoryError::Internal("repository scope poisoned".to_string())
        })?;

        let instance = match resolved.get(&key) {
            Some(instance) => Arc::clone(instance),
            None => {
                let registration = self
                    .registrations
                    .get(&key)
                    .ok_or(RepositoryError::NotRegistered(type_name::<T>()))?;
                let instance =
                    (registration.factory)(Arc::clone(&self.context));
                resolved.insert(key, Arc::clone(&instance));
                instance
            }
        };

        instance
            .downcast::<GenericRepository<T, C>>()
            .map_err(|_| {
                RepositoryError::Internal(format!(
                    "registration for {} produced the wrong repository type",
                    type_name::<T>()
                ))
            })
    }
}
