pub mod config;
pub mod pool;

use crate::core::{Result, UowError};
use crate::transaction::TransactionId;

/// Database connection handle
///
/// A connection serves at most one transaction at a time; the pool hands it
/// out through a `PoolGuard`.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    database: String,
    transaction: Option<TransactionId>,
}

impl Connection {
    pub(crate) fn new(id: u64, database: &str) -> Self {
        Self {
            id,
            database: database.to_string(),
            transaction: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Bind a transaction to this connection
    pub fn begin(&mut self, txn_id: TransactionId) -> Result<()> {
        if let Some(current) = self.transaction {
            return Err(UowError::Connection(format!(
                "connection {} already serves transaction {}",
                self.id, current
            )));
        }
        self.transaction = Some(txn_id);
        Ok(())
    }

    /// Unbind the current transaction, if any
    pub fn finish(&mut self) {
        self.transaction = None;
    }
}
