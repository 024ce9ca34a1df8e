//! PostgreSQL adapter.

mod context;
mod sql;

pub use context::PgContext;
