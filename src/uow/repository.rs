use super::{Backend, TransactionalObject, UnitOfWork};
use crate::core::Result;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed entry point for writing one entity type through a unit of work.
///
/// ```ignore
/// let mut users = Repository::<MemoryBackend, User>::new(backend);
/// users.begin_work().await?;
/// users.create(&alice).await?;
/// users.update(&bob).await?;
/// users.commit_work().await?;
/// ```
pub struct Repository<B: Backend, E: ?Sized> {
    uow: UnitOfWork<B>,
    _entity: PhantomData<fn(&E)>,
}

impl<B, E> Repository<B, E>
where
    B: Backend,
    E: TransactionalObject<B::Transaction> + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self::from_unit_of_work(UnitOfWork::new(backend))
    }

    pub fn from_unit_of_work(uow: UnitOfWork<B>) -> Self {
        Self {
            uow,
            _entity: PhantomData,
        }
    }

    pub async fn create(&mut self, entity: &E) -> Result<()> {
        self.uow.mark_create(entity).await
    }

    pub async fn update(&mut self, entity: &E) -> Result<()> {
        self.uow.mark_update(entity).await
    }

    pub async fn delete(&mut self, entity: &E) -> Result<()> {
        self.uow.mark_delete(entity).await
    }

    pub async fn begin_work(&mut self) -> Result<()> {
        self.uow.begin_work().await
    }

    pub async fn commit_work(&mut self) -> Result<()> {
        self.uow.commit_work().await
    }

    pub async fn rollback_work(&mut self) -> Result<()> {
        self.uow.rollback_work().await
    }

    /// The underlying coordinator, e.g. to mark other entity types in the
    /// same session
    pub fn unit_of_work(&mut self) -> &mut UnitOfWork<B> {
        &mut self.uow
    }

    pub fn into_unit_of_work(self) -> UnitOfWork<B> {
        self.uow
    }
}
