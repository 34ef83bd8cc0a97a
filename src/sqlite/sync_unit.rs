use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::error::SqliteGatewayError;
use crate::results::{ExecutionResult, MutationResult, ResultSet};
use crate::sqlite::config::ScriptObserver;
use crate::sqlite::connection::SqliteConnection;
use crate::sqlite::executor;
use crate::sqlite::params::{Params, verify_param_types};
use crate::statement::Statement;
use crate::types::{ExecuteMode, SqlValue};

/// Synchronous view of a connection inside [`SqliteConnection::run_sync_unit`].
///
/// Everything issued through it belongs to the unit's transaction (or
/// savepoint) and is rolled back if the unit returns an error or panics.
pub struct SyncUnit<'c> {
    conn: &'c Connection,
    conn_id: u64,
    observer: Option<&'c ScriptObserver>,
    depth: usize,
}

impl SqliteConnection {
    /// Run a synchronous unit of work atomically.
    ///
    /// Outside a transaction this uses the engine's own transaction: commit
    /// when `unit` returns `Ok`, rollback on `Err` or panic. When a
    /// transaction is already open (a nested unit, or an async batch from
    /// [`run_async_unit`](Self::run_async_unit)) the unit runs in a savepoint
    /// with the same all-or-nothing behavior. Prefer this over
    /// `run_async_unit` whenever the work does not need to await.
    ///
    /// The connection stays locked for the duration of `unit`.
    ///
    /// # Errors
    /// Returns the unit's error, or the engine error if the transaction cannot
    /// be opened or committed.
    pub async fn run_sync_unit<F, R, E>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&mut SyncUnit<'_>) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<SqliteGatewayError> + Send + 'static,
    {
        let conn_id = self.id();
        let observer = self.inner.script_observer.clone();
        self.with_raw(move |conn| run_unit(conn, conn_id, observer.as_ref(), 0, unit))
            .await
            .map_err(E::from)?
    }
}

fn run_unit<F, R, E>(
    conn: &Connection,
    conn_id: u64,
    observer: Option<&ScriptObserver>,
    depth: usize,
    unit: F,
) -> Result<R, E>
where
    F: FnOnce(&mut SyncUnit<'_>) -> Result<R, E>,
    E: From<SqliteGatewayError>,
{
    if conn.is_autocommit() {
        let tx = conn
            .unchecked_transaction()
            .map_err(SqliteGatewayError::SqliteError)?;
        let mut scope = SyncUnit {
            conn: &tx,
            conn_id,
            observer,
            depth: depth + 1,
        };
        // an early return drops `tx`, which rolls back
        let value = unit(&mut scope)?;
        tx.commit().map_err(SqliteGatewayError::SqliteError)?;
        Ok(value)
    } else {
        let savepoint = Savepoint::open(conn, depth)?;
        let mut scope = SyncUnit {
            conn,
            conn_id,
            observer,
            depth: depth + 1,
        };
        let value = unit(&mut scope)?;
        savepoint.release()?;
        Ok(value)
    }
}

/// Named savepoint that rolls back on drop unless released.
struct Savepoint<'c> {
    conn: &'c Connection,
    name: String,
    released: bool,
}

impl<'c> Savepoint<'c> {
    fn open(conn: &'c Connection, depth: usize) -> Result<Self, SqliteGatewayError> {
        let name = format!("sync_unit_{depth}");
        conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(Self {
            conn,
            name,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), SqliteGatewayError> {
        self.conn.execute_batch(&format!("RELEASE {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let sql = format!("ROLLBACK TO {0}; RELEASE {0}", self.name);
        if let Err(err) = self.conn.execute_batch(&sql) {
            tracing::error!(savepoint = %self.name, error = %err, "failed to roll back savepoint");
        }
    }
}

impl SyncUnit<'_> {
    /// Execute a statement inside the unit; see [`SqliteConnection::execute`].
    ///
    /// # Errors
    /// As [`SqliteConnection::execute`].
    pub fn execute(
        &mut self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, SqliteGatewayError> {
        let statement = statement.into();
        self.check_statement(&statement)?;
        executor::execute(self.conn, statement.sql(), &Params::convert(params).0, mode)
    }

    /// Validate untyped parameters, then execute.
    ///
    /// # Errors
    /// As [`SqliteConnection::execute_untyped`].
    pub fn execute_untyped(
        &mut self,
        statement: impl Into<Statement>,
        params: &[JsonValue],
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, SqliteGatewayError> {
        let statement = statement.into();
        let params = verify_param_types(statement.sql(), params)?;
        self.execute(statement, &params, mode)
    }

    /// # Errors
    /// As [`SqliteConnection::run`].
    pub fn run(
        &mut self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
    ) -> Result<MutationResult, SqliteGatewayError> {
        let statement = statement.into();
        self.check_statement(&statement)?;
        executor::run_mutation(self.conn, statement.sql(), &Params::convert(params).0)
    }

    /// # Errors
    /// As [`SqliteConnection::all`].
    pub fn all(
        &mut self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqliteGatewayError> {
        let statement = statement.into();
        self.check_statement(&statement)?;
        executor::run_fetch_all(self.conn, statement.sql(), &Params::convert(params).0)
    }

    /// # Errors
    /// As [`SqliteConnection::execute_script`].
    pub fn execute_script(&mut self, sql: &str) -> Result<(), SqliteGatewayError> {
        executor::execute_script(self.conn, sql, self.observer)
    }

    /// Run a nested unit in its own savepoint. Its failure rolls back only
    /// its own work; the caller decides whether to propagate it.
    ///
    /// # Errors
    /// Returns the nested unit's error.
    pub fn run_sync_unit<F, R, E>(&mut self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&mut SyncUnit<'_>) -> Result<R, E>,
        E: From<SqliteGatewayError>,
    {
        run_unit(self.conn, self.conn_id, self.observer, self.depth, unit)
    }

    /// The raw engine connection, for anything not covered above.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn check_statement(&self, statement: &Statement) -> Result<(), SqliteGatewayError> {
        match statement {
            Statement::Prepared(prepared) if prepared.connection_id() != self.conn_id => {
                Err(SqliteGatewayError::ForeignStatement {
                    statement_conn: prepared.connection_id(),
                    conn: self.conn_id,
                })
            }
            _ => Ok(()),
        }
    }
}
