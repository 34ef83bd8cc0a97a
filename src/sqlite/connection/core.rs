use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SqliteGatewayError;
use crate::sqlite::config::ScriptObserver;
use crate::sqlite::coordinator::TransactionCoordinator;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive access to the engine connection, movable onto the blocking pool.
pub(crate) type EngineGuard = OwnedMutexGuard<Option<rusqlite::Connection>>;

pub(crate) struct ConnectionInner {
    pub(crate) id: u64,
    /// `None` once closed.
    pub(crate) conn: Arc<Mutex<Option<rusqlite::Connection>>>,
    pub(crate) coordinator: TransactionCoordinator,
    pub(crate) script_observer: Option<ScriptObserver>,
}

/// Handle to one open `SQLite` database.
///
/// Clones share the same engine connection and the same async-unit nesting
/// counter. Engine calls run on tokio's blocking pool and are serialized by
/// a mutex, so statements execute in submission order.
#[derive(Clone)]
pub struct SqliteConnection {
    pub(crate) inner: Arc<ConnectionInner>,
}

impl SqliteConnection {
    pub(crate) fn from_raw(
        conn: rusqlite::Connection,
        script_observer: Option<ScriptObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                conn: Arc::new(Mutex::new(Some(conn))),
                coordinator: TransactionCoordinator::default(),
                script_observer,
            }),
        }
    }

    /// Process-unique id of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Run synchronous `rusqlite` logic against the underlying connection.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ConnectionClosed` after [`close`](Self::close),
    /// or whatever error `func` produces.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqliteGatewayError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqliteGatewayError> + Send + 'static,
        R: Send + 'static,
    {
        self.with_raw(func).await?
    }

    pub(crate) async fn with_raw<F, R>(&self, func: F) -> Result<R, SqliteGatewayError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> R + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.conn.blocking_lock();
            let conn = guard.as_mut().ok_or(SqliteGatewayError::ConnectionClosed)?;
            Ok(func(conn))
        })
        .await
        .map_err(|e| {
            SqliteGatewayError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
        })?
    }

    /// Wait for the engine lock without parking a blocking-pool thread.
    pub(crate) async fn lock_engine(&self) -> EngineGuard {
        Arc::clone(&self.inner.conn).lock_owned().await
    }

    /// Whether [`close`](Self::close) has already run.
    pub async fn is_closed(&self) -> bool {
        self.inner.conn.lock().await.is_none()
    }

    /// Whether the engine is outside any explicit transaction.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ConnectionClosed` after close.
    pub async fn is_autocommit(&self) -> Result<bool, SqliteGatewayError> {
        self.with_raw(|conn| conn.is_autocommit()).await
    }
}

/// Run `func` on the blocking pool with a lock that is already held.
///
/// The task is spawned before this returns, so dropping the returned future
/// does not stop `func` from running.
pub(crate) fn spawn_locked<F, R>(
    mut engine: EngineGuard,
    func: F,
) -> impl Future<Output = Result<R, SqliteGatewayError>>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqliteGatewayError> + Send + 'static,
    R: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || {
        let conn = engine.as_mut().ok_or(SqliteGatewayError::ConnectionClosed)?;
        func(conn)
    });
    async move {
        handle.await.map_err(|e| {
            SqliteGatewayError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
        })?
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}
