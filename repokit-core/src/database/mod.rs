//! Repository ports, their implementation and the persistence contexts they
//! run against.

pub mod infrastructure;
pub mod ports;
pub mod registry;
pub mod repositories;

pub use infrastructure::{MemoryContext, PgContext, QueryTrace};
pub use ports::context::{ChangeKind, ChangeRecord, PersistenceContext};
pub use ports::repository::EntityRepository;
pub use registry::{RepositoryRegistry, RepositoryScope};
pub use repositories::GenericRepository;
