// ============================================================================
// In-Memory Store
// ============================================================================
//
// Committed state is an immutable `Arc<Tables>`. Readers and new transactions
// clone the Arc (O(1)); commits clone the map, apply their change list to the
// copy and swap it in under the write lock (Copy-on-Write), so a commit is
// either fully visible or not visible at all.
//
// ============================================================================

use super::Table;
use crate::core::{IdentityKey, Record, Result, UowError};
use crate::transaction::Change;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type Tables = BTreeMap<String, Table>;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Arc<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_table(&self, name: &str, key_fields: &[&str]) -> Result<()> {
        if key_fields.is_empty() {
            return Err(UowError::Persistence(format!(
                "table '{}' needs at least one key field",
                name
            )));
        }

        let mut guard = self.tables.write().await;
        if guard.contains_key(name) {
            return Err(UowError::Persistence(format!(
                "table '{}' already exists",
                name
            )));
        }

        let mut next = (**guard).clone();
        let key_fields = key_fields.iter().map(|f| f.to_string()).collect();
        next.insert(name.to_string(), Table::new(name, key_fields));
        *guard = Arc::new(next);
        Ok(())
    }

    /// Current committed state
    pub async fn snapshot(&self) -> Arc<Tables> {
        self.tables.read().await.clone()
    }

    /// Applies `changes` in order as one atomic step.
    ///
    /// On the first failing change nothing is applied and that error is
    /// returned unchanged.
    pub async fn apply(&self, changes: &[Change]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut guard = self.tables.write().await;
        let mut next = (**guard).clone();
        for change in changes {
            let table = next
                .get_mut(change.table_name())
                .ok_or_else(|| table_not_found(change.table_name()))?;
            table.apply(change)?;
        }
        *guard = Arc::new(next);
        Ok(())
    }

    pub async fn get(&self, table: &str, key: &IdentityKey) -> Result<Option<Record>> {
        let tables = self.snapshot().await;
        let table = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(table.get(key).cloned())
    }

    /// All committed records of `table` in key order
    pub async fn rows(&self, table: &str) -> Result<Vec<Record>> {
        let tables = self.snapshot().await;
        let table = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(table.records().cloned().collect())
    }

    pub async fn count(&self, table: &str) -> Result<usize> {
        let tables = self.snapshot().await;
        let table = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(table.len())
    }

    /// Inserts one record outside of any transaction
    pub async fn insert_direct(&self, table: &str, record: Record) -> Result<()> {
        let key = {
            let tables = self.snapshot().await;
            let target = tables.get(table).ok_or_else(|| table_not_found(table))?;
            record.key_for(target.key_fields()).ok_or_else(|| {
                UowError::Persistence(format!("record is missing key fields for table '{}'", table))
            })?
        };
        self.apply(&[Change::Insert {
            table: table.to_string(),
            key,
            record,
        }])
        .await
    }

    /// Committed tables as pretty-printed JSON
    pub async fn export_json(&self) -> Result<String> {
        let tables = self.snapshot().await;
        let dump: BTreeMap<&str, Vec<&Record>> = tables
            .iter()
            .map(|(name, table)| (name.as_str(), table.records().collect()))
            .collect();
        serde_json::to_string_pretty(&dump)
            .map_err(|e| UowError::Persistence(format!("failed to export tables: {}", e)))
    }
}

pub(crate) fn table_not_found(name: &str) -> UowError {
    UowError::Persistence(format!("table '{}' not found", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> Record {
        Record::new().with("id", id).with("name", name)
    }

    async fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_table("items", &["id"]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_table_twice_fails() {
        let store = store().await;
        assert!(store.create_table("items", &["id"]).await.is_err());
        assert!(store.create_table("empty_key", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let store = store().await;
        store.insert_direct("items", record(1, "a")).await.unwrap();

        let changes = vec![
            Change::Insert {
                table: "items".to_string(),
                key: IdentityKey::single("id", 2),
                record: record(2, "b"),
            },
            Change::Insert {
                table: "items".to_string(),
                key: IdentityKey::single("id", 1),
                record: record(1, "dup"),
            },
        ];
        assert!(store.apply(&changes).await.is_err());
        assert_eq!(store.rows("items").await.unwrap(), vec![record(1, "a")]);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_commits() {
        let store = store().await;
        let before = store.snapshot().await;
        store.insert_direct("items", record(1, "a")).await.unwrap();

        assert_eq!(before["items"].len(), 0);
        assert_eq!(store.count("items").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_export_json_lists_records() {
        let store = store().await;
        store.insert_direct("items", record(7, "seven")).await.unwrap();

        let json = store.export_json().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["items"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = store().await;
        assert!(store.rows("missing").await.is_err());
        assert!(store.insert_direct("missing", record(1, "a")).await.is_err());
    }
}
