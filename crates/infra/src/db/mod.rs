pub mod builds_repo;
pub mod migrations;
pub mod pool;

pub use pool::{connect_lazy, DbPool, DbPoolError};
