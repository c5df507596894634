use super::{Backend, TransactionalObject};
use crate::core::{Result, UowError};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, Level, Span, event, info_span, warn};

/// What `begin_work` does while a session is already open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeginPolicy {
    /// Fail with `UowError::SessionAlreadyOpen`
    #[default]
    Reject,
    /// Keep the open session and return `Ok(())`
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// One `mark_*` call issued inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub succeeded: bool,
}

/// State of an open work session
struct Session<Tx> {
    tx: Tx,
    operations: Vec<Operation>,
    failure: Option<UowError>,
    span: Span,
}

/// Unit of Work coordinator
///
/// Owns at most one open transaction handle. Without an open session every
/// `mark_*` call runs in its own transaction; after `begin_work` all calls
/// share one transaction until `commit_work` or `rollback_work`.
///
/// One coordinator models one logical caller: all methods take `&mut self`.
/// Use one coordinator per concurrent unit of work.
///
/// # Examples
///
/// ```ignore
/// let mut uow = UnitOfWork::new(backend);
///
/// uow.begin_work().await?;
/// uow.mark_create(&order).await?;
/// uow.mark_update(&customer).await?;
/// uow.commit_work().await?;
/// ```
pub struct UnitOfWork<B: Backend> {
    backend: Arc<B>,
    policy: BeginPolicy,
    session: Option<Session<B::Transaction>>,
    sessions_started: u64,
}

impl<B: Backend> UnitOfWork<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_policy(backend, BeginPolicy::default())
    }

    pub fn with_policy(backend: Arc<B>, policy: BeginPolicy) -> Self {
        Self {
            backend,
            policy,
            session: None,
            sessions_started: 0,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn policy(&self) -> BeginPolicy {
        self.policy
    }

    pub fn is_in_session(&self) -> bool {
        self.session.is_some()
    }

    /// Operations issued in the open session, failed ones included
    pub fn operation_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.operations.len())
    }

    /// Operations of the open session in issue order
    pub fn operations(&self) -> &[Operation] {
        self.session.as_ref().map_or(&[], |s| s.operations.as_slice())
    }

    /// Whether an operation of the open session has failed
    pub fn has_failed(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.failure.is_some())
    }

    /// Open a work session.
    ///
    /// # Errors
    /// `SessionAlreadyOpen` under `BeginPolicy::Reject` when a session is open,
    /// or the backend's `Connection` error. A failed begin leaves the
    /// coordinator idle.
    pub async fn begin_work(&mut self) -> Result<()> {
        if self.session.is_some() {
            return match self.policy {
                BeginPolicy::Reject => Err(UowError::SessionAlreadyOpen),
                BeginPolicy::Ignore => Ok(()),
            };
        }

        self.sessions_started += 1;
        let span = info_span!("uow_session", session = self.sessions_started);
        let tx = self.backend.begin().instrument(span.clone()).await?;
        event!(parent: &span, Level::DEBUG, "session opened");

        self.session = Some(Session {
            tx,
            operations: Vec::new(),
            failure: None,
            span,
        });
        Ok(())
    }

    pub async fn mark_create<E>(&mut self, entity: &E) -> Result<()>
    where
        E: TransactionalObject<B::Transaction> + ?Sized,
    {
        self.mark(OperationKind::Create, entity).await
    }

    pub async fn mark_update<E>(&mut self, entity: &E) -> Result<()>
    where
        E: TransactionalObject<B::Transaction> + ?Sized,
    {
        self.mark(OperationKind::Update, entity).await
    }

    pub async fn mark_delete<E>(&mut self, entity: &E) -> Result<()>
    where
        E: TransactionalObject<B::Transaction> + ?Sized,
    {
        self.mark(OperationKind::Delete, entity).await
    }

    /// Finish the open session.
    ///
    /// Commits when every operation succeeded. Otherwise, or when the commit
    /// is rejected, rolls back and returns the first error. The handle is
    /// released and the coordinator is idle afterwards in every case.
    pub async fn commit_work(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(UowError::NoActiveSession)?;
        self.close_session(session, true).await
    }

    /// Discard the open session and release its handle. An earlier failed
    /// operation does not make this fail.
    pub async fn rollback_work(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(UowError::NoActiveSession)?;
        self.close_session(session, false).await
    }

    /// Run `work` inside a fresh session.
    ///
    /// Commits when `work` returns `Ok`, rolls back and returns the error
    /// otherwise. If `work` already closed the session itself, nothing more
    /// is done. When a session is already open and the policy is
    /// `BeginPolicy::Ignore`, `work` joins it and the session is left open
    /// for its owner to finish.
    pub async fn run_work<T, F>(&mut self, work: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<T>>,
    {
        let joined = self.is_in_session();
        self.begin_work().await?;
        if joined {
            event!(Level::DEBUG, "work joined the open session");
            return work(self).await;
        }
        match work(self).await {
            Ok(value) => {
                if self.session.is_some() {
                    self.commit_work().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Some(session) = self.session.take() {
                    if let Err(cleanup) = self.close_session(session, false).await {
                        warn!(error = %cleanup, original = %err, "cleanup after failed work failed");
                    }
                }
                Err(err)
            }
        }
    }

    async fn mark<E>(&mut self, kind: OperationKind, entity: &E) -> Result<()>
    where
        E: TransactionalObject<B::Transaction> + ?Sized,
    {
        match self.session.as_mut() {
            Some(session) => {
                if let Some(failure) = &session.failure {
                    event!(parent: &session.span, Level::DEBUG, %kind, "skipped after earlier failure");
                    return Err(UowError::SessionAborted(failure.to_string()));
                }

                let result = execute(kind, entity, &mut session.tx)
                    .instrument(session.span.clone())
                    .await;
                session.operations.push(Operation {
                    kind,
                    succeeded: result.is_ok(),
                });
                match &result {
                    Ok(()) => event!(parent: &session.span, Level::DEBUG, %kind, seq = session.operations.len(), "operation applied"),
                    Err(err) => {
                        warn!(parent: &session.span, %kind, error = %err, "operation failed; session will roll back");
                        session.failure = Some(err.clone());
                    }
                }
                result
            }
            None => self.auto_commit(kind, entity).await,
        }
    }

    /// One operation in its own transaction
    async fn auto_commit<E>(&self, kind: OperationKind, entity: &E) -> Result<()>
    where
        E: TransactionalObject<B::Transaction> + ?Sized,
    {
        let span = info_span!("uow_auto_commit", %kind);
        async {
            // Nothing to clean up when no handle was obtained.
            let mut tx = self.backend.begin().await?;

            let outcome = match execute(kind, entity, &mut tx).await {
                Ok(()) => self.commit_or_rollback(&mut tx).await,
                Err(err) => {
                    self.rollback_quietly(&mut tx, &err).await;
                    Err(err)
                }
            };
            let outcome = self.release(&mut tx, outcome).await;
            event!(Level::DEBUG, ok = outcome.is_ok(), "auto-commit finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn close_session(&self, mut session: Session<B::Transaction>, commit: bool) -> Result<()> {
        let span = session.span.clone();
        async {
            let failed = session.operations.iter().filter(|op| !op.succeeded).count();
            let outcome = match session.failure.take() {
                _ if !commit => self.backend.rollback(&mut session.tx).await,
                Some(failure) => {
                    event!(
                        Level::INFO,
                        operations = session.operations.len(),
                        failed,
                        "rolling back session after failed operation"
                    );
                    self.rollback_quietly(&mut session.tx, &failure).await;
                    Err(failure)
                }
                None => self.commit_or_rollback(&mut session.tx).await,
            };
            let outcome = self.release(&mut session.tx, outcome).await;
            event!(
                Level::DEBUG,
                operations = session.operations.len(),
                committed = commit && outcome.is_ok(),
                "session closed"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn commit_or_rollback(&self, tx: &mut B::Transaction) -> Result<()> {
        match self.backend.commit(tx).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.rollback_quietly(tx, &err).await;
                Err(err)
            }
        }
    }

    /// Roll back while handling `cause`; a rollback failure is only logged
    async fn rollback_quietly(&self, tx: &mut B::Transaction, cause: &UowError) {
        if let Err(err) = self.backend.rollback(tx).await {
            warn!(error = %err, cause = %cause, "rollback failed");
        }
    }

    /// Release `tx` and fold the release result into `outcome`.
    /// An earlier error always wins over a release error.
    async fn release(&self, tx: &mut B::Transaction, outcome: Result<()>) -> Result<()> {
        match (self.backend.release(tx).await, outcome) {
            (Ok(()), outcome) => outcome,
            (Err(release_err), Ok(())) => Err(release_err),
            (Err(release_err), Err(err)) => {
                warn!(error = %release_err, cause = %err, "release failed");
                Err(err)
            }
        }
    }
}

impl<B: Backend> Drop for UnitOfWork<B> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            warn!(
                parent: &session.span,
                operations = session.operations.len(),
                "unit of work dropped with an open session; its writes are discarded"
            );
        }
    }
}

async fn execute<Tx, E>(kind: OperationKind, entity: &E, tx: &mut Tx) -> Result<()>
where
    Tx: Send,
    E: TransactionalObject<Tx> + ?Sized,
{
    match kind {
        OperationKind::Create => entity.create_by_tx(tx).await,
        OperationKind::Update => entity.update_by_tx(tx).await,
        OperationKind::Delete => entity.delete_by_tx(tx).await,
    }
}
