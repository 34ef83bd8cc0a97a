//! Convenient imports for common functionality.

pub use crate::error::SqliteGatewayError;
pub use crate::executor::AsyncStatementExecutor;
pub use crate::results::{CustomDbRow, ExecutionResult, MutationResult, ResultSet};
pub use crate::sqlite::{
    DbSource, SqliteConnection, SqliteOptions, SqliteOptionsBuilder, SqlitePreparedStatement,
    SyncUnit, verify_param_types,
};
pub use crate::statement::Statement;
pub use crate::types::{ExecuteMode, RowValues, SqlValue};
