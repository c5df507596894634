use thiserror::Error;

/// Failure taxonomy shared by the coordinator, the backend trait and the
/// bundled in-memory backend.
///
/// Every variant carries owned text so the error is `Clone`: the coordinator
/// keeps the first failure of an open session and hands it back again from
/// `commit_work`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UowError {
    /// The backend could not hand out a transaction handle.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single create/update/delete was rejected by the store.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The store rejected the commit itself.
    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Rollback error: {0}")]
    Rollback(String),

    #[error("Release error: {0}")]
    Release(String),

    #[error("A unit of work session is already open")]
    SessionAlreadyOpen,

    #[error("No unit of work session is open")]
    NoActiveSession,

    /// An earlier operation in the open session failed; later operations are
    /// not executed.
    #[error("Session aborted by an earlier failure: {0}")]
    SessionAborted(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl UowError {
    /// Errors produced by misuse of the begin/commit protocol rather than by
    /// the store.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::SessionAlreadyOpen | Self::NoActiveSession)
    }
}

pub type Result<T> = std::result::Result<T, UowError>;
