use crate::core::Result;
use async_trait::async_trait;

/// Transaction lifecycle of a persistence backend.
///
/// The coordinator guarantees that every handle returned by `begin` is passed
/// to exactly one of `commit` or `rollback` (or to `rollback` after a failed
/// `commit`) and then to `release`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Opaque handle of one open transaction
    type Transaction: Send;

    /// # Errors
    /// `UowError::Connection` when no connection can be obtained.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// # Errors
    /// `UowError::Commit` when the store rejects the transaction.
    async fn commit(&self, tx: &mut Self::Transaction) -> Result<()>;

    /// Discard the transaction's writes. Best effort.
    async fn rollback(&self, tx: &mut Self::Transaction) -> Result<()>;

    /// Free the resources behind the handle. Must be safe to call after
    /// commit or rollback, and more than once.
    async fn release(&self, tx: &mut Self::Transaction) -> Result<()>;
}
