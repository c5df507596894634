// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is one write issued inside a transaction. Changes are kept in
// issue order and replayed against the committed tables at commit time.
//
// ============================================================================

use crate::core::{IdentityKey, Record};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single write recorded in a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert {
        table: String,
        key: IdentityKey,
        record: Record,
    },

    /// Replace the record stored under `key`
    Update {
        table: String,
        key: IdentityKey,
        record: Record,
    },

    /// Remove the record stored under `key`; a missing record is not an error
    Delete { table: String, key: IdentityKey },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::Insert { table, .. } => table,
            Change::Update { table, .. } => table,
            Change::Delete { table, .. } => table,
        }
    }

    pub fn key(&self) -> &IdentityKey {
        match self {
            Change::Insert { key, .. } | Change::Update { key, .. } | Change::Delete { key, .. } => {
                key
            }
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert { .. } => ChangeKind::Insert,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind(), self.table_name(), self.key())
    }
}
