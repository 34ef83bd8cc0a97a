use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;

/// Register `regexp(pattern, text)` on a connection, which also enables the
/// `text REGEXP pattern` operator.
///
/// Matching is case-insensitive and Unicode-aware. The result is 1 on a match
/// and 0 otherwise; a NULL text never matches. The compiled pattern is kept as
/// SQLite auxiliary data, so a constant pattern compiles once per statement.
pub(crate) fn register_regexp(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        regexp,
    )
}

fn regexp(ctx: &Context<'_>) -> rusqlite::Result<i64> {
    let re = ctx.get_or_create_aux(0, |vr| -> Result<Regex, Box<dyn std::error::Error + Send + Sync>> {
        Ok(compile(vr.as_str()?)?)
    })?;
    let matched = match ctx.get_raw(1) {
        ValueRef::Null => false,
        value => re.is_match(&value_text(value)),
    };
    Ok(i64::from(matched))
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .unicode(true)
        .build()
}

fn value_text(value: ValueRef<'_>) -> Cow<'_, str> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes),
        ValueRef::Integer(i) => Cow::Owned(i.to_string()),
        ValueRef::Real(f) => Cow::Owned(f.to_string()),
        ValueRef::Null => Cow::Borrowed(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(conn: &rusqlite::Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn matches_case_insensitively() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        assert_eq!(eval(&conn, "SELECT regexp('abc', 'ABC')"), 1);
        assert_eq!(eval(&conn, "SELECT regexp('xyz', 'ABC')"), 0);
        assert_eq!(eval(&conn, "SELECT 'Crème brûlée' REGEXP 'BRÛLÉE$'"), 1);
    }

    #[test]
    fn null_text_and_numbers() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        assert_eq!(eval(&conn, "SELECT regexp('a', NULL)"), 0);
        assert_eq!(eval(&conn, "SELECT regexp('^12', 123)"), 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        let res: rusqlite::Result<i64> =
            conn.query_row("SELECT regexp('(', 'x')", [], |row| row.get(0));
        assert!(res.is_err());
    }
}
