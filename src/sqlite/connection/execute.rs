use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::SqliteGatewayError;
use crate::results::{ExecutionResult, MutationResult, ResultSet};
use crate::sqlite::executor;
use crate::sqlite::params::{Params, verify_param_types};
use crate::sqlite::prepared::SqlitePreparedStatement;
use crate::statement::Statement;
use crate::types::{ExecuteMode, SqlValue};

use super::SqliteConnection;

impl SqliteConnection {
    /// Prepare a statement for repeated execution on this connection.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::StatementPrepare` for malformed SQL or
    /// unknown tables/columns.
    pub async fn prepare(&self, sql: &str) -> Result<SqlitePreparedStatement, SqliteGatewayError> {
        let query: Arc<str> = Arc::from(sql);
        let query_clone = Arc::clone(&query);
        // warm the cache so repeated executions don't re-prepare.
        self.with_connection(move |conn| executor::prepare(conn, &query_clone).map(|_| ()))
            .await?;
        Ok(SqlitePreparedStatement::new(self.clone(), query))
    }

    /// Execute a statement with positional parameters in the given mode.
    ///
    /// # Errors
    /// - `StatementPrepare` if raw SQL cannot be prepared
    /// - `StatementExecution` if the engine rejects the execution
    /// - `ForeignStatement` if a prepared statement belongs to another connection
    /// - `ConnectionClosed` after close
    pub async fn execute(
        &self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, SqliteGatewayError> {
        let sql = self.statement_sql(&statement.into())?;
        let params = Params::convert(params).0;
        self.with_connection(move |conn| executor::execute(conn, &sql, &params, mode))
            .await
    }

    /// Execute with parameters that arrived untyped, validating them first.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::InvalidParameterType` without touching the
    /// engine if any parameter is not text, a number, or null; otherwise as
    /// [`execute`](Self::execute).
    pub async fn execute_untyped(
        &self,
        statement: impl Into<Statement>,
        params: &[JsonValue],
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, SqliteGatewayError> {
        let statement = statement.into();
        let params = verify_param_types(statement.sql(), params)?;
        self.execute(statement, &params, mode).await
    }

    /// Mutation-mode shorthand for [`execute`](Self::execute).
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn run(
        &self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
    ) -> Result<MutationResult, SqliteGatewayError> {
        let sql = self.statement_sql(&statement.into())?;
        let params = Params::convert(params).0;
        self.with_connection(move |conn| executor::run_mutation(conn, &sql, &params))
            .await
    }

    /// Fetch-all shorthand for [`execute`](Self::execute).
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn all(
        &self,
        statement: impl Into<Statement>,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqliteGatewayError> {
        let sql = self.statement_sql(&statement.into())?;
        let params = Params::convert(params).0;
        self.with_connection(move |conn| executor::run_fetch_all(conn, &sql, &params))
            .await
    }

    /// Execute a script of zero or more `;`-separated statements verbatim.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::ScriptExecution` if any statement fails;
    /// which one is not reported.
    pub async fn execute_script(&self, sql: &str) -> Result<(), SqliteGatewayError> {
        let sql_owned = sql.to_owned();
        let observer = self.inner.script_observer.clone();
        self.with_connection(move |conn| {
            executor::execute_script(conn, &sql_owned, observer.as_ref())
        })
        .await
    }

    fn statement_sql(&self, statement: &Statement) -> Result<Arc<str>, SqliteGatewayError> {
        match statement {
            Statement::Sql(sql) => Ok(Arc::from(sql.as_str())),
            Statement::Prepared(prepared) => {
                if prepared.connection_id() == self.id() {
                    Ok(prepared.query_arc())
                } else {
                    Err(SqliteGatewayError::ForeignStatement {
                        statement_conn: prepared.connection_id(),
                        conn: self.id(),
                    })
                }
            }
        }
    }
}
