// ============================================================================
// Transaction Bookkeeping
// ============================================================================
//
// Backend-side state of one transaction handle:
// - State Pattern: Active -> Committed / Aborted
// - Command Pattern: recorded changes replayed at commit, discarded on rollback
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::{Change, ChangeKind};
pub use state::{Transaction, TransactionId, TransactionState};
