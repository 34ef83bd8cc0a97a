use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteGatewayError {
    /// A statement argument whose runtime type is not text, number, or null.
    #[error("Invalid field type {value} for sql {sql}")]
    InvalidParameterType { value: String, sql: String },

    #[error("Failed to prepare statement `{sql}`: {source}")]
    StatementPrepare {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to execute statement `{sql}`: {source}")]
    StatementExecution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Script execution error: {source}")]
    ScriptExecution {
        #[source]
        source: rusqlite::Error,
    },

    #[error("Open error: {0}")]
    Open(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Prepared statement belongs to connection {statement_conn}, not {conn}")]
    ForeignStatement { statement_conn: u64, conn: u64 },

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqliteGatewayError {
    /// The underlying engine error, when there is one.
    #[must_use]
    pub fn engine_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::StatementPrepare { source, .. }
            | Self::StatementExecution { source, .. }
            | Self::ScriptExecution { source } => Some(source),
            Self::SqliteError(err) => Some(err),
            _ => None,
        }
    }
}
