/// Unit of Work tests
///
/// Auto-commit and session behaviour of `UnitOfWork` against the in-memory backend.
/// Run with: cargo test --test unit_of_work_tests
use async_trait::async_trait;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use uow_template::prelude::*;

const TABLE: &str = "test_entity";

#[derive(Debug, Clone, PartialEq)]
struct TestEntity {
    id: i64,
    name: String,
}

impl Entity for TestEntity {
    const TABLE: &'static str = TABLE;

    fn identity_key(&self) -> IdentityKey {
        IdentityKey::single("id", self.id)
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
    }
}

/// Entity whose delete is always rejected by the store
struct RejectingDelete(TestEntity);

#[async_trait]
impl TransactionalObject<MemoryTransaction> for RejectingDelete {
    async fn create_by_tx(&self, tx: &mut MemoryTransaction) -> Result<()> {
        self.0.create_by_tx(tx).await
    }

    async fn update_by_tx(&self, tx: &mut MemoryTransaction) -> Result<()> {
        self.0.update_by_tx(tx).await
    }

    async fn delete_by_tx(&self, _tx: &mut MemoryTransaction) -> Result<()> {
        Err(UowError::Persistence("delete entity error".into()))
    }
}

fn entity(id: i64, name: &str) -> TestEntity {
    TestEntity {
        id,
        name: name.to_string(),
    }
}

async fn setup() -> Arc<MemoryBackend> {
    let backend = MemoryBackend::open(ConnectionConfig::new("test")).unwrap();
    backend.store().create_table(TABLE, &["id"]).await.unwrap();
    Arc::new(backend)
}

async fn seed(backend: &MemoryBackend, e: &TestEntity) {
    backend
        .store()
        .insert_direct(TABLE, e.to_record())
        .await
        .unwrap();
}

async fn find(backend: &MemoryBackend, id: i64) -> Option<Record> {
    backend
        .store()
        .get(TABLE, &IdentityKey::single("id", id))
        .await
        .unwrap()
}

async fn count(backend: &MemoryBackend) -> usize {
    backend.store().count(TABLE).await.unwrap()
}

// ============================================================================
// Without beginWork
// ============================================================================

#[tokio::test]
async fn test_auto_commit_create() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    let expected = entity(1, "test");

    assert_ok!(uow.mark_create(&expected).await);

    assert_eq!(find(&backend, 1).await, Some(expected.to_record()));
    assert_eq!(count(&backend).await, 1);
}

#[tokio::test]
async fn test_auto_commit_update() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    seed(&backend, &entity(1, "test")).await;
    let expected = entity(1, "update successfully");

    assert_ok!(uow.mark_update(&expected).await);

    assert_eq!(find(&backend, 1).await, Some(expected.to_record()));
}

#[tokio::test]
async fn test_auto_commit_delete() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    seed(&backend, &entity(1, "test")).await;

    assert_ok!(uow.mark_delete(&entity(1, "")).await);

    assert_eq!(find(&backend, 1).await, None);
}

#[tokio::test]
async fn test_auto_commit_delete_missing_is_ok() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    assert_ok!(uow.mark_delete(&entity(42, "ghost")).await);
    assert_eq!(count(&backend).await, 0);
}

#[tokio::test]
async fn test_auto_commit_rejected_create_leaves_store_unchanged() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    seed(&backend, &entity(1, "original")).await;

    let err = assert_err!(uow.mark_create(&entity(1, "duplicate")).await);

    assert!(matches!(err, UowError::Persistence(_)));
    assert_eq!(find(&backend, 1).await, Some(entity(1, "original").to_record()));
    assert_eq!(backend.pool().stats().await.active_connections, 0);
}

#[tokio::test]
async fn test_auto_commit_update_of_missing_record_fails() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    let err = assert_err!(uow.mark_update(&entity(9, "nobody")).await);
    assert!(matches!(err, UowError::Persistence(_)));
    assert_eq!(count(&backend).await, 0);
}

#[tokio::test]
async fn test_entity_is_not_mutated() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    let e = entity(1, "same");

    uow.mark_create(&e).await.unwrap();
    uow.mark_update(&e).await.unwrap();

    assert_eq!(e, entity(1, "same"));
}

// ============================================================================
// With beginWork
// ============================================================================

#[tokio::test]
async fn test_session_applies_all_actions_in_one_transaction() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    let entity1 = entity(1, "first entity");
    let entity2 = entity(2, "second entity");
    let entity2_update = entity(2, "update entity");
    let entity3 = entity(3, "third entity");

    seed(&backend, &entity2).await;
    seed(&backend, &entity3).await;

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity1).await.unwrap();
    uow.mark_update(&entity2_update).await.unwrap();
    uow.mark_delete(&entity3).await.unwrap();

    assert_eq!(count(&backend).await, 2);
    assert_eq!(find(&backend, 2).await, Some(entity2.to_record()));
    assert!(find(&backend, 3).await.is_some());

    uow.commit_work().await.unwrap();

    assert_eq!(count(&backend).await, 2);
    assert_eq!(find(&backend, 1).await, Some(entity1.to_record()));
    assert_eq!(find(&backend, 2).await, Some(entity2_update.to_record()));
    assert_eq!(find(&backend, 3).await, None);
}

#[tokio::test]
async fn test_session_rolls_back_everything_on_failed_operation() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    let entity1 = entity(1, "first entity");
    let entity2 = entity(2, "second entity");
    let entity2_update = entity(2, "update entity");
    let entity3 = RejectingDelete(entity(3, "third entity"));

    seed(&backend, &entity2).await;
    seed(&backend, &entity3.0).await;
    let before = backend.store().rows(TABLE).await.unwrap();
    let before_json = backend.store().export_json().await.unwrap();

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity1).await.unwrap();
    uow.mark_update(&entity2_update).await.unwrap();
    assert!(uow.mark_delete(&entity3).await.is_err());

    let err = assert_err!(uow.commit_work().await);
    assert_eq!(err, UowError::Persistence("delete entity error".into()));

    assert_eq!(backend.store().rows(TABLE).await.unwrap(), before);
    assert_eq!(backend.store().export_json().await.unwrap(), before_json);
    assert!(!uow.is_in_session());
    assert_eq!(backend.pool().stats().await.active_connections, 0);
}

#[tokio::test]
async fn test_last_write_wins_in_issue_order() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity(1, "v1")).await.unwrap();
    uow.mark_update(&entity(1, "v2")).await.unwrap();
    uow.mark_update(&entity(1, "v3")).await.unwrap();
    uow.mark_delete(&entity(2, "")).await.unwrap();
    uow.mark_create(&entity(2, "recreated")).await.unwrap();
    uow.commit_work().await.unwrap();

    assert_eq!(find(&backend, 1).await, Some(entity(1, "v3").to_record()));
    assert_eq!(find(&backend, 2).await, Some(entity(2, "recreated").to_record()));
}

#[tokio::test]
async fn test_session_sees_its_own_writes() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity(1, "new")).await.unwrap();
    // Visible to the session, so a second create of the same key is rejected
    // and an update of it succeeds.
    assert!(uow.mark_create(&entity(1, "again")).await.is_err());
    uow.rollback_work().await.unwrap();

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity(1, "new")).await.unwrap();
    uow.mark_update(&entity(1, "newer")).await.unwrap();
    uow.commit_work().await.unwrap();

    assert_eq!(find(&backend, 1).await, Some(entity(1, "newer").to_record()));
}

#[tokio::test]
async fn test_conflicting_sessions_second_commit_rejected() {
    let backend = setup().await;
    let mut first = UnitOfWork::new(Arc::clone(&backend));
    let mut second = UnitOfWork::new(Arc::clone(&backend));

    first.begin_work().await.unwrap();
    second.begin_work().await.unwrap();
    first.mark_create(&entity(1, "first")).await.unwrap();
    second.mark_create(&entity(2, "second")).await.unwrap();
    second.mark_create(&entity(1, "second")).await.unwrap();

    first.commit_work().await.unwrap();
    let err = assert_err!(second.commit_work().await);

    assert!(matches!(err, UowError::Commit(_)));
    assert_eq!(count(&backend).await, 1);
    assert_eq!(find(&backend, 1).await, Some(entity(1, "first").to_record()));
    assert_eq!(backend.pool().stats().await.active_connections, 0);
}

#[tokio::test]
async fn test_coordinator_is_reusable_across_sessions() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    for id in 1..=3 {
        uow.begin_work().await.unwrap();
        uow.mark_create(&entity(id, "row")).await.unwrap();
        uow.commit_work().await.unwrap();
    }

    assert_eq!(count(&backend).await, 3);
}

#[tokio::test]
async fn test_heterogeneous_entities_in_one_session() {
    struct Tag {
        label: &'static str,
    }

    impl Entity for Tag {
        const TABLE: &'static str = "tags";

        fn identity_key(&self) -> IdentityKey {
            IdentityKey::single("label", self.label)
        }

        fn to_record(&self) -> Record {
            Record::new().with("label", self.label)
        }
    }

    let backend = setup().await;
    backend.store().create_table("tags", &["label"]).await.unwrap();
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    uow.begin_work().await.unwrap();
    uow.mark_create(&entity(1, "tagged")).await.unwrap();
    uow.mark_create(&Tag { label: "rust" }).await.unwrap();
    uow.commit_work().await.unwrap();

    assert_eq!(count(&backend).await, 1);
    assert_eq!(backend.store().count("tags").await.unwrap(), 1);
}

#[tokio::test]
async fn test_begin_work_fails_without_connection() {
    let backend = setup().await;
    backend.pool().close();
    let mut uow = UnitOfWork::new(Arc::clone(&backend));

    assert!(matches!(
        uow.begin_work().await,
        Err(UowError::Connection(_))
    ));
    assert!(!uow.is_in_session());
    assert!(matches!(
        uow.mark_create(&entity(1, "x")).await,
        Err(UowError::Connection(_))
    ));
}

#[tokio::test]
async fn test_run_work_commits_closure_writes() {
    let backend = setup().await;
    let mut uow = UnitOfWork::new(Arc::clone(&backend));
    let first = entity(1, "a");
    let second = entity(2, "b");

    let applied = uow
        .run_work(|uow| {
            Box::pin(async move {
                uow.mark_create(&first).await?;
                uow.mark_create(&second).await?;
                Ok(uow.operation_count())
            })
        })
        .await
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(count(&backend).await, 2);
}
