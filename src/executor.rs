use async_trait::async_trait;

use crate::error::SqliteGatewayError;
use crate::results::{MutationResult, ResultSet};
use crate::sqlite::SqliteConnection;
use crate::types::SqlValue;

/// Minimal async execution surface, so helpers and units of work can be
/// written against a trait instead of the concrete connection.
#[async_trait]
pub trait AsyncStatementExecutor {
    /// Executes a script of one or more statements. No parameters are supported.
    async fn execute_batch(&self, query: &str) -> Result<(), SqliteGatewayError>;

    /// Executes a statement and returns every resulting row.
    async fn execute_select(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqliteGatewayError>;

    /// Executes a single DML statement (INSERT, UPDATE, DELETE, etc.).
    async fn execute_dml(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<MutationResult, SqliteGatewayError>;
}

#[async_trait]
impl AsyncStatementExecutor for SqliteConnection {
    async fn execute_batch(&self, query: &str) -> Result<(), SqliteGatewayError> {
        self.execute_script(query).await
    }

    async fn execute_select(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqliteGatewayError> {
        self.all(query, params).await
    }

    async fn execute_dml(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<MutationResult, SqliteGatewayError> {
        self.run(query, params).await
    }
}
