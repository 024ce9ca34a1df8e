#![allow(dead_code)]

use repokit_core::{Entity, EntityMeta, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct User {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub age: i32,
    pub email: Option<String>,
}

impl Entity for User {
    const TABLE: &'static str = "Users";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        let mut values = self.meta.values();
        values.push(("Name", self.name.clone().into()));
        values.push(("Age", self.age.into()));
        values.push(("Email", self.email.clone().into()));
        values
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct Tag {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub label: String,
}

impl Entity for Tag {
    const TABLE: &'static str = "Tags";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        let mut values = self.meta.values();
        values.push(("Label", self.label.clone().into()));
        values
    }
}

pub fn user(name: &str, age: i32, email: Option<&str>) -> User {
    User {
        meta: EntityMeta::new(Uuid::new_v4()),
        name: name.to_string(),
        age,
        email: email.map(str::to_string),
    }
}

pub fn user_with_id(id: Uuid, name: &str, age: i32) -> User {
    User {
        meta: EntityMeta::new(id),
        name: name.to_string(),
        age,
        email: None,
    }
}

/// Six users with mixed ages, one without an email.
pub fn fixture_users() -> Vec<User> {
    vec![
        user("Mallory", 17, Some("mallory@example.com")),
        user("Alice", 34, Some("alice@example.com")),
        user("Bob", 18, None),
        user("Carol", 52, Some("carol@example.com")),
        user("Dave", 9, Some("dave@example.com")),
        user("Erin", 27, Some("erin@example.com")),
    ]
}
