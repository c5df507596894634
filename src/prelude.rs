//! Everything needed to describe entities and drive a unit of work.
//!
//! ```
//! use uow_template::prelude::*;
//!
//! struct Note {
//!     id: i64,
//!     body: String,
//! }
//!
//! impl Entity for Note {
//!     const TABLE: &'static str = "notes";
//!
//!     fn identity_key(&self) -> IdentityKey {
//!         IdentityKey::single("id", self.id)
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         Record::new().with("id", self.id).with("body", self.body.as_str())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let backend = std::sync::Arc::new(MemoryBackend::open(ConnectionConfig::default()).unwrap());
//! backend.store().create_table("notes", &["id"]).await.unwrap();
//!
//! let mut uow = UnitOfWork::new(backend.clone());
//! uow.mark_create(&Note { id: 1, body: "hi".into() }).await.unwrap();
//! assert_eq!(backend.store().count("notes").await.unwrap(), 1);
//! # });
//! ```

pub use crate::{
    Backend, BeginPolicy, ConnectionConfig, Entity, IdentityKey, MemoryBackend, MemoryTransaction,
    Record, Repository, Result, TransactionalObject, UnitOfWork, UowError, Value,
};
