use crate::core::Result;
use async_trait::async_trait;

/// An entity that knows how to write itself through a transaction handle.
///
/// `Tx` is the backend's transaction handle type. Implementations must not
/// change the entity itself; update and delete use it only as a source of
/// key and field values.
#[async_trait]
pub trait TransactionalObject<Tx: Send>: Send + Sync {
    /// Insert the current field values as a new record.
    ///
    /// # Errors
    /// `UowError::Persistence` when the store rejects the insert,
    /// e.g. on a duplicate key.
    async fn create_by_tx(&self, tx: &mut Tx) -> Result<()>;

    /// Overwrite the record identified by this entity's key.
    ///
    /// # Errors
    /// `UowError::Persistence` when no such record exists or the write is
    /// rejected.
    async fn update_by_tx(&self, tx: &mut Tx) -> Result<()>;

    /// Remove the record identified by this entity's key. Removing a record
    /// that does not exist succeeds.
    async fn delete_by_tx(&self, tx: &mut Tx) -> Result<()>;
}
