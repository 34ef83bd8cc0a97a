//! Coalescing batch transactions for asynchronous units of work.
//!
//! `SQLite` executes the statements of one connection strictly in order, so
//! nested async units can share a single transaction by counting: the
//! outermost entry emits `BEGIN TRANSACTION`, the outermost exit emits
//! `COMMIT`, and everything in between runs inside that one transaction.
//!
//! # Hazard
//!
//! While a unit is suspended, any other task holding a clone of the same
//! connection can run statements, and those statements land inside the open
//! transaction. For that reason the batch is always committed, even when the
//! unit fails: a rollback would also discard the unrelated work that ran in
//! between. A failed unit therefore leaves whatever it already wrote in
//! place. Use [`SqliteConnection::run_async_unit`] only to batch writes for
//! throughput where the work is idempotent or can be replayed; use
//! [`SqliteConnection::run_sync_unit`] whenever atomicity matters.

use std::future::Future;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::SqliteGatewayError;
use crate::sqlite::connection::{SqliteConnection, spawn_locked};
use crate::sqlite::executor;

const BEGIN: &str = "BEGIN TRANSACTION";
const COMMIT: &str = "COMMIT";

/// Per-connection nesting counter for async units.
///
/// The lock is held across BEGIN and COMMIT emission so the 0→1 and 1→0
/// transitions cannot interleave with another task's entry or exit.
#[derive(Debug, Default)]
pub(crate) struct TransactionCoordinator {
    depth: Mutex<usize>,
}

impl SqliteConnection {
    /// Run an async unit of work inside the connection's coalesced batch
    /// transaction.
    ///
    /// Nested calls (from inside `unit`, or from other tasks while a unit is
    /// open) join the outer transaction instead of starting their own. The
    /// transaction is committed when the outermost unit finishes, **whether
    /// or not it succeeded**; see the [module docs](crate::sqlite::coordinator)
    /// for why there is no rollback.
    ///
    /// If the returned future is dropped before completion, the nesting level
    /// is still released (and the batch committed if it was the last one).
    ///
    /// # Errors
    /// Returns the unit's own error after the bookkeeping has run. If the unit
    /// succeeded but `BEGIN`/`COMMIT` failed, that engine error is returned.
    pub async fn run_async_unit<F, Fut, R, E>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(SqliteConnection) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<SqliteGatewayError>,
    {
        let guard = self.enter_async_unit().await?;
        let outcome = unit(self.clone()).await;
        let released = guard.release().await;
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(commit_err)) => {
                tracing::error!(
                    conn = self.id(),
                    error = %commit_err,
                    "commit after failed async unit also failed"
                );
                Err(err)
            }
        }
    }

    /// Current async-unit nesting depth on this connection.
    pub async fn transaction_depth(&self) -> usize {
        *self.inner.coordinator.depth.lock().await
    }

    async fn enter_async_unit(&self) -> Result<DepthGuard, SqliteGatewayError> {
        let mut depth = self.inner.coordinator.depth.lock().await;
        if *depth > 0 {
            *depth += 1;
            tracing::trace!(conn = self.id(), depth = *depth, "joined async batch");
            return Ok(DepthGuard {
                conn: Some(self.clone()),
            });
        }

        // The engine lock is taken before the guard is armed and moves into
        // the BEGIN task. A COMMIT issued by an abandoned guard has to wait
        // for that lock, so it can never run ahead of its BEGIN.
        let engine = self.lock_engine().await;
        *depth = 1;
        let mut guard = DepthGuard {
            conn: Some(self.clone()),
        };
        tracing::debug!(conn = self.id(), "beginning batch transaction");
        let observer = self.inner.script_observer.clone();
        let begun = spawn_locked(engine, move |conn| {
            executor::execute_script(conn, BEGIN, observer.as_ref())
        })
        .await;
        if let Err(err) = begun {
            *depth = 0;
            guard.conn = None;
            return Err(err);
        }
        Ok(guard)
    }
}

/// One held nesting level. Dropping it without [`release`](Self::release)
/// (cancellation, panic) still gives the level back.
struct DepthGuard {
    conn: Option<SqliteConnection>,
}

impl DepthGuard {
    async fn release(mut self) -> Result<(), SqliteGatewayError> {
        let Some(conn) = self.conn.clone() else {
            return Ok(());
        };
        let depth = conn.inner.coordinator.depth.lock().await;
        // Disarm only once the counter is held. The COMMIT below is spawned
        // before its first await, so it runs even if this future is dropped.
        self.conn = None;
        leave_locked(&conn, depth).await
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        tracing::warn!(conn = conn.id(), "async unit abandoned; releasing its nesting level");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let depth = conn.inner.coordinator.depth.lock().await;
                if let Err(err) = leave_locked(&conn, depth).await {
                    tracing::error!(conn = conn.id(), error = %err, "failed to commit abandoned batch");
                }
            });
        } else {
            release_blocking(&conn);
        }
    }
}

/// Give back one level; true when it was the outermost.
fn step_down(depth: &mut usize) -> bool {
    *depth = depth.saturating_sub(1);
    *depth == 0
}

async fn leave_locked(
    conn: &SqliteConnection,
    mut depth: MutexGuard<'_, usize>,
) -> Result<(), SqliteGatewayError> {
    let outermost = step_down(&mut depth);
    tracing::trace!(conn = conn.id(), depth = *depth, "left async unit");
    if outermost {
        tracing::debug!(conn = conn.id(), "committing batch transaction");
        conn.execute_script(COMMIT).await?;
    }
    Ok(())
}

/// Release path for a guard dropped outside any tokio runtime.
fn release_blocking(conn: &SqliteConnection) {
    let Ok(mut depth) = conn.inner.coordinator.depth.try_lock() else {
        tracing::error!(conn = conn.id(), "nesting counter busy; abandoned level not released");
        return;
    };
    if !step_down(&mut depth) {
        return;
    }
    let mut engine = conn.inner.conn.blocking_lock();
    if let Some(engine) = engine.as_mut() {
        let observer = conn.inner.script_observer.as_ref();
        if let Err(err) = executor::execute_script(engine, COMMIT, observer) {
            tracing::error!(conn = conn.id(), error = %err, "failed to commit abandoned batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_down_reports_outermost_exit() {
        let mut depth = 2;
        assert!(!step_down(&mut depth));
        assert!(step_down(&mut depth));
        assert!(step_down(&mut depth));
        assert_eq!(depth, 0);
    }
}
