// ============================================================================
// In-Memory Backend
// ============================================================================
//
// `Backend` implementation over `InMemoryStore`. Each transaction leases one
// pooled connection, reads from the committed snapshot taken at begin plus
// its own writes, and replays its change log against the current committed
// state at commit.
//
// ============================================================================

use super::{Backend, TransactionalObject};
use crate::connection::config::ConnectionConfig;
use crate::connection::pool::{ConnectionPool, PoolGuard};
use crate::core::{IdentityKey, Record, Result, UowError};
use crate::storage::memory::table_not_found;
use crate::storage::{InMemoryStore, Table, Tables};
use crate::transaction::{Change, Transaction, TransactionId, TransactionState};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Describes how an entity maps onto a table of the in-memory store.
///
/// Every `Entity` is a `TransactionalObject<MemoryTransaction>`.
pub trait Entity: Send + Sync {
    const TABLE: &'static str;

    fn identity_key(&self) -> IdentityKey;

    fn to_record(&self) -> Record;
}

#[async_trait]
impl<E: Entity> TransactionalObject<MemoryTransaction> for E {
    async fn create_by_tx(&self, tx: &mut MemoryTransaction) -> Result<()> {
        tx.insert(E::TABLE, self.identity_key(), self.to_record())
    }

    async fn update_by_tx(&self, tx: &mut MemoryTransaction) -> Result<()> {
        tx.update(E::TABLE, self.identity_key(), self.to_record())
    }

    async fn delete_by_tx(&self, tx: &mut MemoryTransaction) -> Result<()> {
        tx.remove(E::TABLE, self.identity_key())
    }
}

pub struct MemoryBackend {
    store: Arc<InMemoryStore>,
    pool: Arc<ConnectionPool>,
}

impl MemoryBackend {
    pub fn new(store: Arc<InMemoryStore>, pool: Arc<ConnectionPool>) -> Self {
        Self { store, pool }
    }

    /// Fresh empty store behind a pool built from `config`
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let pool = ConnectionPool::new(config)?;
        Ok(Self::new(Arc::new(InMemoryStore::new()), Arc::new(pool)))
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        let mut guard = self.pool.get_connection().await?;
        let txn = Transaction::new(TransactionId::new());
        if let Some(connection) = guard.connection_mut() {
            connection.begin(txn.id())?;
        }
        let snapshot = self.store.snapshot().await;
        debug!("began {}", txn.id());

        Ok(MemoryTransaction {
            txn,
            snapshot,
            writes: BTreeMap::new(),
            guard: Some(guard),
        })
    }

    async fn commit(&self, tx: &mut MemoryTransaction) -> Result<()> {
        if tx.guard.is_none() {
            return Err(UowError::Commit(format!(
                "transaction {} was already released",
                tx.id()
            )));
        }
        if !tx.state().is_active() {
            return Err(UowError::Commit(format!(
                "cannot commit: transaction {} is {}",
                tx.id(),
                tx.state()
            )));
        }

        // Rejected changes leave the transaction active so it can be rolled back.
        self.store
            .apply(tx.txn.changes())
            .await
            .map_err(|e| UowError::Commit(format!("transaction {} rejected: {}", tx.id(), e)))?;
        tx.txn.commit()?;
        debug!("committed {} ({} changes)", tx.id(), tx.txn.change_count());
        Ok(())
    }

    async fn rollback(&self, tx: &mut MemoryTransaction) -> Result<()> {
        tx.txn.rollback()?;
        tx.writes.clear();
        debug!("rolled back {}", tx.id());
        Ok(())
    }

    async fn release(&self, tx: &mut MemoryTransaction) -> Result<()> {
        if let Some(mut guard) = tx.guard.take() {
            // A handle released without commit never becomes visible.
            if tx.state().is_active() {
                tx.txn.rollback()?;
                tx.writes.clear();
            }
            guard.close().await;
        }
        Ok(())
    }
}

/// Transaction handle of `MemoryBackend`
///
/// Reads see the committed state as of `begin` plus this transaction's own
/// writes. Writes are checked immediately against that view, so a duplicate
/// insert or an update of a missing record fails at the call site.
pub struct MemoryTransaction {
    txn: Transaction,
    snapshot: Arc<Tables>,
    /// Own writes per table; `None` marks a deleted record
    writes: BTreeMap<String, BTreeMap<IdentityKey, Option<Record>>>,
    guard: Option<PoolGuard>,
}

impl MemoryTransaction {
    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }

    pub fn state(&self) -> TransactionState {
        self.txn.state()
    }

    /// Writes issued so far, in order
    pub fn changes(&self) -> &[Change] {
        self.txn.changes()
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    pub fn get(&self, table: &str, key: &IdentityKey) -> Result<Option<Record>> {
        self.table(table)?;
        Ok(self.current(table, key).cloned())
    }

    pub fn insert(&mut self, table: &str, key: IdentityKey, record: Record) -> Result<()> {
        self.txn.ensure_active()?;
        self.check_record(table, &key, &record)?;
        if self.current(table, &key).is_some() {
            return Err(UowError::Persistence(format!(
                "duplicate key {} in table '{}'",
                key, table
            )));
        }
        self.write(Change::Insert {
            table: table.to_string(),
            key,
            record,
        })
    }

    pub fn update(&mut self, table: &str, key: IdentityKey, record: Record) -> Result<()> {
        self.txn.ensure_active()?;
        self.check_record(table, &key, &record)?;
        if self.current(table, &key).is_none() {
            return Err(UowError::Persistence(format!(
                "no record with key {} in table '{}'",
                key, table
            )));
        }
        self.write(Change::Update {
            table: table.to_string(),
            key,
            record,
        })
    }

    /// Removing a missing record succeeds; a key that does not fit the
    /// table's key fields does not
    pub fn remove(&mut self, table: &str, key: IdentityKey) -> Result<()> {
        self.txn.ensure_active()?;
        self.check_key(table, &key)?;
        self.write(Change::Delete {
            table: table.to_string(),
            key,
        })
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.snapshot.get(name).ok_or_else(|| table_not_found(name))
    }

    fn check_record(&self, table: &str, key: &IdentityKey, record: &Record) -> Result<()> {
        let schema = self.table(table)?;
        match record.key_for(schema.key_fields()) {
            Some(derived) if &derived == key => Ok(()),
            _ => Err(UowError::Persistence(format!(
                "record does not carry key {} for table '{}'",
                key, table
            ))),
        }
    }

    fn check_key(&self, table: &str, key: &IdentityKey) -> Result<()> {
        let schema = self.table(table)?;
        let fits = key.fields().eq(schema.key_fields().iter().map(String::as_str))
            && key.parts().iter().all(|(_, value)| !value.is_null());
        if fits {
            Ok(())
        } else {
            Err(UowError::Persistence(format!(
                "key {} does not match key fields {:?} of table '{}'",
                key,
                schema.key_fields(),
                table
            )))
        }
    }

    fn current(&self, table: &str, key: &IdentityKey) -> Option<&Record> {
        match self.writes.get(table).and_then(|rows| rows.get(key)) {
            Some(own) => own.as_ref(),
            None => self.snapshot.get(table).and_then(|t| t.get(key)),
        }
    }

    fn write(&mut self, change: Change) -> Result<()> {
        let value = match &change {
            Change::Insert { record, .. } | Change::Update { record, .. } => Some(record.clone()),
            Change::Delete { .. } => None,
        };
        self.writes
            .entry(change.table_name().to_string())
            .or_default()
            .insert(change.key().clone(), value);
        self.txn.record_change(change)
    }
}
