use crate::sqlite::SqlitePreparedStatement;

/// A statement to execute: raw SQL text, or a statement already prepared on
/// a connection.
#[derive(Debug, Clone)]
pub enum Statement {
    Sql(String),
    Prepared(SqlitePreparedStatement),
}

impl Statement {
    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Statement::Sql(sql) => sql,
            Statement::Prepared(prepared) => prepared.sql(),
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::Sql(sql.to_owned())
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::Sql(sql)
    }
}

impl From<SqlitePreparedStatement> for Statement {
    fn from(prepared: SqlitePreparedStatement) -> Self {
        Statement::Prepared(prepared)
    }
}

impl From<&SqlitePreparedStatement> for Statement {
    fn from(prepared: &SqlitePreparedStatement) -> Self {
        Statement::Prepared(prepared.clone())
    }
}
