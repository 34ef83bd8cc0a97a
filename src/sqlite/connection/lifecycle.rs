use std::io::Write;
use std::sync::Arc;

use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName};

use crate::error::SqliteGatewayError;
use crate::sqlite::config::{DbSource, SqliteOptions};
use crate::sqlite::functions::register_regexp;

use super::SqliteConnection;

impl SqliteConnection {
    /// Open a database with default options.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::Open` if the path cannot be opened or the
    /// image is not a valid database.
    pub async fn open(source: impl Into<DbSource>) -> Result<Self, SqliteGatewayError> {
        Self::open_with(SqliteOptions::new(source)).await
    }

    /// Open a database with explicit options.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ConfigError` for invalid options and
    /// `SqliteGatewayError::Open` if the database cannot be opened.
    pub async fn open_with(opts: SqliteOptions) -> Result<Self, SqliteGatewayError> {
        opts.validate()?;
        let source = format!("{:?}", opts.source);
        let script_observer = opts.script_observer.clone();
        let conn = tokio::task::spawn_blocking(move || open_blocking(&opts))
            .await
            .map_err(|e| {
                SqliteGatewayError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
        let handle = Self::from_raw(conn, script_observer);
        tracing::debug!(conn = handle.id(), source = %source, "opened sqlite database");
        Ok(handle)
    }

    /// Close the underlying engine connection.
    ///
    /// Every clone of this handle observes the close. An async batch still
    /// open at this point is abandoned; the engine discards its uncommitted
    /// work.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ConnectionClosed` if already closed, or the
    /// engine error if `SQLite` refuses to close (the handle then stays open).
    pub async fn close(&self) -> Result<(), SqliteGatewayError> {
        let depth = self.transaction_depth().await;
        if depth > 0 {
            tracing::warn!(conn = self.id(), depth, "closing connection inside an async unit");
        }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.conn.blocking_lock();
            let conn = guard.take().ok_or(SqliteGatewayError::ConnectionClosed)?;
            conn.close().map_err(|(conn, err)| {
                *guard = Some(conn);
                SqliteGatewayError::SqliteError(err)
            })
        })
        .await
        .map_err(|e| {
            SqliteGatewayError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
        })??;
        tracing::debug!(conn = self.id(), "closed sqlite database");
        Ok(())
    }

    /// Snapshot of the `main` database as a byte image, independent of
    /// whether it lives in a file or in memory.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ConnectionClosed` after close, or the
    /// engine error if serialization fails.
    pub async fn serialize(&self) -> Result<Vec<u8>, SqliteGatewayError> {
        self.with_connection(|conn| Ok(conn.serialize(DatabaseName::Main)?.to_vec()))
            .await
    }
}

fn open_blocking(opts: &SqliteOptions) -> Result<Connection, SqliteGatewayError> {
    let conn = match &opts.source {
        DbSource::Path(path) => Connection::open(path)
            .map_err(|e| open_error(&format!("{}: {e}", path.display())))?,
        DbSource::Memory => {
            Connection::open_in_memory().map_err(|e| open_error(&e.to_string()))?
        }
        DbSource::Image(bytes) => restore_image(bytes)?,
    };

    // Opening is lazy; read the schema so a file that is not a database fails now.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
        .map_err(|e| open_error(&e.to_string()))?;

    if let Some(timeout) = opts.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    if opts.wal && matches!(opts.source, DbSource::Path(_)) {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    if opts.register_regexp {
        register_regexp(&conn)?;
    }
    Ok(conn)
}

/// Load a serialized image into a private in-memory database.
fn restore_image(bytes: &[u8]) -> Result<Connection, SqliteGatewayError> {
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| open_error(&format!("cannot stage database image: {e}")))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| open_error(&format!("cannot stage database image: {e}")))?;

    let mut conn = Connection::open_in_memory().map_err(|e| open_error(&e.to_string()))?;
    conn.restore(DatabaseName::Main, file.path(), None::<fn(Progress)>)
        .map_err(|e| open_error(&format!("invalid database image: {e}")))?;
    Ok(conn)
}

fn open_error(message: &str) -> SqliteGatewayError {
    SqliteGatewayError::Open(message.to_owned())
}
