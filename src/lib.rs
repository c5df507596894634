// ============================================================================
// uow-template
// ============================================================================
//
// Unit of Work coordination over a transactional backend, plus an in-memory
// backend with a bounded connection pool.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod prelude;
pub mod storage;
pub mod transaction;
pub mod uow;

pub use crate::core::{IdentityKey, Record, Result, UowError, Value};

pub use connection::{
    Connection,
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};

pub use storage::InMemoryStore;

pub use uow::{
    Backend, BeginPolicy, Entity, MemoryBackend, MemoryTransaction, OperationKind, Repository,
    TransactionalObject, UnitOfWork,
};
