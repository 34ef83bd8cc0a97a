use rusqlite::types::Value;
use rusqlite::{CachedStatement, Connection};

use crate::error::SqliteGatewayError;
use crate::results::{ExecutionResult, MutationResult, ResultSet};
use crate::types::ExecuteMode;

use super::config::ScriptObserver;
use super::query::build_result_set;

// Engine-facing operations shared by the async connection and `SyncUnit`.
// Every function here runs on the thread that owns the rusqlite connection.

/// Prepare (or fetch from the statement cache) a statement.
pub(crate) fn prepare<'c>(
    conn: &'c Connection,
    sql: &str,
) -> Result<CachedStatement<'c>, SqliteGatewayError> {
    conn.prepare_cached(sql).map_err(|source| {
        tracing::error!(sql, error = %source, "failed to prepare statement");
        SqliteGatewayError::StatementPrepare {
            sql: sql.to_owned(),
            source,
        }
    })
}

/// Execute once and report changes plus the last inserted rowid.
///
/// Failures here are an expected outcome for some callers (constraint probes,
/// insert-or-ignore fallbacks) and are not logged.
pub(crate) fn run_mutation(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<MutationResult, SqliteGatewayError> {
    let mut stmt = prepare(conn, sql)?;
    let changes = stmt
        .execute(rusqlite::params_from_iter(params.iter()))
        .map_err(|source| SqliteGatewayError::StatementExecution {
            sql: sql.to_owned(),
            source,
        })?;
    let rowid = conn.last_insert_rowid();
    Ok(MutationResult {
        changes,
        insert_id: (rowid != 0).then_some(rowid),
    })
}

pub(crate) fn run_fetch_all(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, SqliteGatewayError> {
    let mut stmt = prepare(conn, sql)?;
    build_result_set(&mut stmt, params).map_err(|source| {
        tracing::error!(sql, error = %source, "failed to fetch rows");
        SqliteGatewayError::StatementExecution {
            sql: sql.to_owned(),
            source,
        }
    })
}

pub(crate) fn execute(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    mode: ExecuteMode,
) -> Result<ExecutionResult, SqliteGatewayError> {
    match mode {
        ExecuteMode::Mutation => run_mutation(conn, sql, params).map(ExecutionResult::Mutation),
        ExecuteMode::FetchAll => run_fetch_all(conn, sql, params).map(ExecutionResult::Rows),
    }
}

/// Run a script of zero or more statements verbatim.
pub(crate) fn execute_script(
    conn: &Connection,
    sql: &str,
    observer: Option<&ScriptObserver>,
) -> Result<(), SqliteGatewayError> {
    if let Some(observer) = observer {
        observer(sql);
    }
    conn.execute_batch(sql)
        .map_err(|source| SqliteGatewayError::ScriptExecution { source })
}
