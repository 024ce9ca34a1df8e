mod support;

use std::sync::Arc;

use anyhow::Result;
use repokit_core::RepositoryError;
use repokit_core::database::{
    EntityRepository, MemoryContext, PersistenceContext, RepositoryRegistry,
};
use repokit_core::query::Column;
use support::{Tag, User, fixture_users};
use tokio_util::sync::CancellationToken;

#[test]
fn registry_lists_registered_tables() {
    let registry = RepositoryRegistry::<MemoryContext>::new()
        .register::<User>()
        .register::<Tag>();

    assert_eq!(registry.len(), 2);
    assert!(registry.is_registered::<User>());
    assert!(registry.is_registered::<Tag>());
    assert_eq!(registry.registered_tables(), vec!["Tags", "Users"]);
}

#[test]
fn registering_twice_keeps_a_single_entry() {
    let registry = RepositoryRegistry::<MemoryContext>::new()
        .register::<User>()
        .register::<User>();
    assert_eq!(registry.len(), 1);
}

#[test]
fn unregistered_entity_is_reported_by_type() {
    let registry =
        RepositoryRegistry::<MemoryContext>::new().register::<User>();
    let scope = registry.begin_scope(Arc::new(MemoryContext::new()));

    match scope.repository::<Tag>() {
        Err(RepositoryError::NotRegistered(name)) => {
            assert!(name.ends_with("Tag"))
        }
        other => panic!("expected NotRegistered, got {other:?}"),
    }
}

#[test]
fn scope_shares_one_repository_per_entity() -> Result<()> {
    let registry = RepositoryRegistry::<MemoryContext>::new()
        .register::<User>()
        .register::<Tag>();

    let scope = registry.begin_scope(Arc::new(MemoryContext::new()));
    let first = scope.repository::<User>()?;
    let second = scope.repository::<User>()?;
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(first.context(), scope.context()));

    let other_scope = registry.begin_scope(Arc::new(MemoryContext::new()));
    let third = other_scope.repository::<User>()?;
    assert!(!Arc::ptr_eq(&first, &third));
    assert!(!Arc::ptr_eq(first.context(), third.context()));
    Ok(())
}

#[tokio::test]
async fn repositories_in_a_scope_commit_through_the_shared_context()
-> Result<()> {
    let registry = RepositoryRegistry::<MemoryContext>::new()
        .register::<User>()
        .register::<Tag>();
    let scope = registry.begin_scope(Arc::new(MemoryContext::new()));
    let cancel = CancellationToken::new();

    let users = scope.repository::<User>()?;
    for mut user in fixture_users() {
        users.add(&mut user, &cancel).await?;
    }
    assert_eq!(scope.context().pending_changes().await?.len(), 6);
    assert_eq!(scope.context().save_changes().await?, 6);

    let adults = users
        .get_count(Some(Column::new("Age").ge(18)), &cancel)
        .await?;
    assert_eq!(adults, 4);

    let tags = scope.repository::<Tag>()?;
    assert_eq!(tags.get_count(None, &cancel).await?, 0);
    Ok(())
}
