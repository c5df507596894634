// ============================================================================
// Unit of Work
// ============================================================================
//
// `UnitOfWork` sequences entity writes inside one transactional boundary:
// - without a session every mark_* call is its own begin/commit/release cycle
// - between begin_work and commit_work all calls share one transaction handle
//
// The coordinator only sees two seams: `Backend` (transaction lifecycle) and
// `TransactionalObject` (how an entity writes itself through a handle).
//
// ============================================================================

pub mod backend;
pub mod coordinator;
pub mod memory;
pub mod object;
pub mod repository;

pub use backend::Backend;
pub use coordinator::{BeginPolicy, Operation, OperationKind, UnitOfWork};
pub use memory::{Entity, MemoryBackend, MemoryTransaction};
pub use object::TransactionalObject;
pub use repository::Repository;
