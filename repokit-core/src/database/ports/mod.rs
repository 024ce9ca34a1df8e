//! Ports (interfaces) between the generic repository and the stores it
//! drives. Implementations live under `database::infrastructure`.

pub mod context;
pub mod repository;
