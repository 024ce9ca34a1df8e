//! Persistence context implementations.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryContext, QueryTrace};
pub use postgres::PgContext;
