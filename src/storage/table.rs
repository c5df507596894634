use crate::core::{IdentityKey, Record, Result, UowError};
use crate::transaction::Change;
use std::collections::BTreeMap;

/// Records of one entity type, keyed by their identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    key_fields: Vec<String>,
    rows: BTreeMap<IdentityKey, Record>,
}

impl Table {
    pub fn new(name: impl Into<String>, key_fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            key_fields,
            rows: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Record> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Records in key order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.rows.values()
    }

    pub fn insert(&mut self, key: IdentityKey, record: Record) -> Result<()> {
        self.validate(&key, &record)?;
        if self.rows.contains_key(&key) {
            return Err(UowError::Persistence(format!(
                "duplicate key {} in table '{}'",
                key, self.name
            )));
        }
        self.rows.insert(key, record);
        Ok(())
    }

    pub fn update(&mut self, key: &IdentityKey, record: Record) -> Result<()> {
        self.validate(key, &record)?;
        match self.rows.get_mut(key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(UowError::Persistence(format!(
                "no record with key {} in table '{}'",
                key, self.name
            ))),
        }
    }

    /// Returns whether a record was removed
    pub fn delete(&mut self, key: &IdentityKey) -> bool {
        self.rows.remove(key).is_some()
    }

    pub fn apply(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::Insert { key, record, .. } => self.insert(key.clone(), record.clone()),
            Change::Update { key, record, .. } => self.update(key, record.clone()),
            Change::Delete { key, .. } => {
                self.delete(key);
                Ok(())
            }
        }
    }

    /// The record must carry the key fields, with the same values as `key`.
    fn validate(&self, key: &IdentityKey, record: &Record) -> Result<()> {
        match record.key_for(&self.key_fields) {
            Some(derived) if &derived == key => Ok(()),
            Some(derived) => Err(UowError::Persistence(format!(
                "record key {} does not match target key {} in table '{}'",
                derived, key, self.name
            ))),
            None => Err(UowError::Persistence(format!(
                "record is missing key fields {:?} for table '{}'",
                self.key_fields, self.name
            ))),
        }
    }
}
