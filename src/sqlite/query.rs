use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::{Value, ValueRef};

use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns the engine error if `idx` is out of range.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<RowValues> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(t) => RowValues::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => RowValues::Blob(b.to_vec()),
    })
}

/// Run a prepared statement and materialize every row it produces.
///
/// The whole set is collected before returning; there is no cursor. A
/// statement that yields no rows (DML, DDL) still runs and produces an empty
/// set.
///
/// # Errors
/// Returns the engine error raised while binding, stepping, or reading a row.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<ResultSet> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows_iter = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
