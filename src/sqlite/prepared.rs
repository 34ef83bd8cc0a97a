use std::fmt;
use std::sync::Arc;

use crate::error::SqliteGatewayError;
use crate::results::{MutationResult, ResultSet};
use crate::types::SqlValue;

use super::connection::SqliteConnection;

/// Handle to a statement prepared on one connection.
///
/// Instances can be cloned and reused across awaited calls. Dropping the handle
/// simply releases the reference; the underlying connection keeps the
/// statement cached via `rusqlite`'s `prepare_cached` mechanism.
#[derive(Clone)]
pub struct SqlitePreparedStatement {
    connection: SqliteConnection,
    query: Arc<str>,
}

impl SqlitePreparedStatement {
    pub(crate) fn new(connection: SqliteConnection, query: Arc<str>) -> Self {
        Self { connection, query }
    }

    /// Execute in mutation mode on the owning connection.
    ///
    /// # Errors
    /// Returns [`SqliteGatewayError`] if the connection is closed or execution fails.
    pub async fn run(&self, params: &[SqlValue]) -> Result<MutationResult, SqliteGatewayError> {
        self.connection.run(self, params).await
    }

    /// Execute in fetch-all mode on the owning connection.
    ///
    /// # Errors
    /// Returns [`SqliteGatewayError`] if the connection is closed or execution fails.
    pub async fn all(&self, params: &[SqlValue]) -> Result<ResultSet, SqliteGatewayError> {
        self.connection.all(self, params).await
    }

    /// Access the raw SQL string of the prepared statement.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.query
    }

    pub(crate) fn query_arc(&self) -> Arc<str> {
        Arc::clone(&self.query)
    }

    /// Id of the connection this statement was prepared on.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection.id()
    }
}

impl fmt::Debug for SqlitePreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePreparedStatement")
            .field("connection_id", &self.connection.id())
            .field("query", &self.query)
            .finish()
    }
}
