use super::{Connection, config::ConnectionConfig};
use crate::core::{Result, UowError};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Connection pool
///
/// At most `max_connections` connections are leased at once. A lease that
/// cannot be served within `connect_timeout` fails with
/// `UowError::Connection`.
pub struct ConnectionPool {
    config: ConnectionConfig,
    available: Arc<Mutex<VecDeque<PooledConnection>>>,
    permits: Arc<Semaphore>,
    total_connections: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

/// An idle connection waiting in the pool
struct PooledConnection {
    connection: Connection,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            last_used: Instant::now(),
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        match idle_timeout {
            Some(timeout) => self.last_used.elapsed() > timeout,
            None => false,
        }
    }
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(UowError::Config)?;

        let next_id = AtomicU64::new(1);
        let mut idle = VecDeque::with_capacity(config.max_connections);
        for _ in 0..config.min_connections {
            let id = next_id.fetch_add(1, Ordering::SeqCst);
            idle.push_back(PooledConnection::new(Connection::new(id, &config.database)));
        }

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_connections)),
            total_connections: Arc::new(AtomicUsize::new(idle.len())),
            available: Arc::new(Mutex::new(idle)),
            next_id,
            config,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Lease a connection from the pool
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let permit = tokio::time::timeout(
            self.config.connect_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            UowError::Connection(format!(
                "pool timeout: no connection to '{}' available after {:?}",
                self.config.database, self.config.connect_timeout
            ))
        })?
        .map_err(|_| UowError::Connection(format!("pool for '{}' is closed", self.config.database)))?;

        let connection = match self.take_available().await {
            Some(connection) => connection,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.total_connections.fetch_add(1, Ordering::SeqCst);
                Connection::new(id, &self.config.database)
            }
        };
        debug!("leased connection {} to '{}'", connection.id(), self.config.database);

        Ok(PoolGuard {
            connection: Some(connection),
            permit: Some(permit),
            pool: Arc::clone(&self.available),
            total_connections: Arc::clone(&self.total_connections),
        })
    }

    /// Pop a reusable idle connection, discarding stale ones
    async fn take_available(&self) -> Option<Connection> {
        let mut available = self.available.lock().await;
        while let Some(pooled) = available.pop_front() {
            if pooled.is_idle_too_long(self.config.idle_timeout) {
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            return Some(pooled.connection);
        }
        None
    }

    /// Refuse all further leases. Leased connections stay valid until returned.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub async fn stats(&self) -> PoolStats {
        let available = self.available.lock().await.len();
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII lease of one pooled connection
///
/// Returns the connection to the pool when closed or dropped.
pub struct PoolGuard {
    connection: Option<Connection>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<Mutex<VecDeque<PooledConnection>>>,
    total_connections: Arc<AtomicUsize>,
}

impl PoolGuard {
    /// The leased connection, or `None` once it has been returned
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    /// Return the connection to the pool. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.finish();
            debug!("returned connection {} to pool", connection.id());
            self.pool
                .lock()
                .await
                .push_back(PooledConnection::new(connection));
        }
        drop(self.permit.take());
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.finish();
            if let Ok(mut pool) = self.pool.try_lock() {
                pool.push_back(PooledConnection::new(connection));
            } else {
                warn!(
                    "PoolGuard for connection {} dropped while the pool was busy; connection discarded",
                    connection.id()
                );
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
