//! Async data-access layer over an embedded `SQLite` database.
//!
//! A [`SqliteConnection`] runs parameterized statements in mutation or
//! fetch-all mode, raw scripts, and two kinds of units of work:
//!
//! - [`SqliteConnection::run_sync_unit`]: a real transaction with rollback on
//!   error. The default choice.
//! - [`SqliteConnection::run_async_unit`]: a coalescing batch transaction for
//!   async work that always commits. See [`sqlite::coordinator`].
//!
//! ```rust,no_run
//! use sqlite_gateway::prelude::*;
//!
//! # async fn demo() -> Result<(), SqliteGatewayError> {
//! let conn = SqliteConnection::open(DbSource::Memory).await?;
//! conn.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY, x INTEGER)").await?;
//! let info = conn.run("INSERT INTO t (x) VALUES (?)", &[SqlValue::from(5)]).await?;
//! assert_eq!(info.changes, 1);
//! let rows = conn.all("SELECT x FROM t ORDER BY id", &[]).await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(()) }
//! ```

pub mod error;
pub mod executor;
pub mod prelude;
pub mod results;
pub mod sqlite;
pub mod statement;
pub mod types;

pub use error::SqliteGatewayError;
pub use executor::AsyncStatementExecutor;
pub use results::{CustomDbRow, ExecutionResult, MutationResult, ResultSet};
pub use sqlite::{
    DbSource, SqliteConnection, SqliteOptions, SqliteOptionsBuilder, SqlitePreparedStatement,
    SyncUnit,
};
pub use statement::Statement;
pub use types::{ExecuteMode, RowValues, SqlValue};
