use rusqlite::types::Value;
use serde_json::Value as JsonValue;

use crate::error::SqliteGatewayError;
use crate::types::SqlValue;

/// Convert a single `SqlValue` to a rusqlite `Value`.
#[must_use]
pub fn sql_value_to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Null => Value::Null,
    }
}

/// Check that every untyped argument is text, a number, or null and convert
/// the list into bindable values.
///
/// This is the entry point for parameters that arrive without static types
/// (deserialized payloads, scripting bridges). Booleans, arrays and objects
/// are rejected up front instead of being coerced by the engine.
///
/// # Errors
/// Returns `SqliteGatewayError::InvalidParameterType` naming the first
/// offending value and the statement text.
pub fn verify_param_types(
    sql: &str,
    params: &[JsonValue],
) -> Result<Vec<SqlValue>, SqliteGatewayError> {
    params
        .iter()
        .map(|value| match value {
            JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Integer(i)),
                None => n.as_f64().map(SqlValue::Real).ok_or_else(|| invalid(sql, value)),
            },
            JsonValue::Null => Ok(SqlValue::Null),
            JsonValue::Bool(_) | JsonValue::Array(_) | JsonValue::Object(_) => {
                tracing::warn!(sql, params = ?params, "invalid parameter type");
                Err(invalid(sql, value))
            }
        })
        .collect()
}

fn invalid(sql: &str, value: &JsonValue) -> SqliteGatewayError {
    SqliteGatewayError::InvalidParameterType {
        value: value.to_string(),
        sql: sql.to_owned(),
    }
}

/// `SQLite` parameter container.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[SqlValue]) -> Self {
        Params(params.iter().map(sql_value_to_sqlite_value).collect())
    }

    /// Borrow the underlying values.
    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }

    /// Build a borrowed params slice suitable for rusqlite execution.
    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.0.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
    }
}
