use serde_json::json;
use sqlite_gateway::prelude::*;

async fn setup() -> Result<SqliteConnection, SqliteGatewayError> {
    let conn = SqliteConnection::open(DbSource::Memory).await?;
    conn.execute_script(
        "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, x INTEGER, label TEXT UNIQUE);",
    )
    .await?;
    Ok(conn)
}

async fn count_rows(conn: &SqliteConnection) -> Result<i64, SqliteGatewayError> {
    let rs = conn.all("SELECT COUNT(*) AS cnt FROM t", &[]).await?;
    let val = rs.results[0]
        .get("cnt")
        .and_then(|v| v.as_int())
        .ok_or_else(|| SqliteGatewayError::ExecutionError("missing count".into()))?;
    Ok(*val)
}

#[tokio::test]
async fn mutation_reports_changes_and_increasing_insert_ids() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;

    let first = conn
        .run("INSERT INTO t (x) VALUES (?)", &[SqlValue::from(5)])
        .await?;
    assert_eq!(first.changes, 1);
    let first_id = first.insert_id.expect("insert id");
    assert!(first_id > 0);

    let second = conn
        .run("INSERT INTO t (x) VALUES (?)", &[SqlValue::from(6)])
        .await?;
    assert!(second.insert_id.expect("insert id") > first_id);

    let updated = conn
        .run("UPDATE t SET x = x + 1 WHERE x >= ?", &[SqlValue::from(0)])
        .await?;
    assert_eq!(updated.changes, 2);
    Ok(())
}

#[tokio::test]
async fn insert_id_absent_before_any_insert() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    let info = conn.run("DELETE FROM t", &[]).await?;
    assert_eq!(info.changes, 0);
    assert_eq!(info.insert_id, None);
    Ok(())
}

#[tokio::test]
async fn fetch_all_returns_every_row_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    for x in [3, 1, 2] {
        conn.run("INSERT INTO t (x) VALUES (?)", &[SqlValue::from(x)])
            .await?;
    }

    let rows = conn.all("SELECT x FROM t ORDER BY x", &[]).await?;
    let xs: Vec<i64> = rows
        .iter()
        .map(|row| *row.get("x").and_then(RowValues::as_int).unwrap())
        .collect();
    assert_eq!(xs, vec![1, 2, 3]);
    assert_eq!(
        rows.get_column_names().map(|c| c.as_slice()),
        Some(&["x".to_string()][..])
    );

    let empty = conn
        .all("SELECT x FROM t WHERE x > ?", &[SqlValue::from(100)])
        .await?;
    assert!(empty.is_empty());
    Ok(())
}

#[tokio::test]
async fn execute_dispatches_on_mode() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    let res = conn
        .execute(
            "INSERT INTO t (x, label) VALUES (?, ?)",
            &[SqlValue::from(1), SqlValue::from("one")],
            ExecuteMode::Mutation,
        )
        .await?;
    assert_eq!(res.into_mutation().map(|m| m.changes), Some(1));

    let res = conn
        .execute("SELECT label, NULL AS missing FROM t", &[], ExecuteMode::FetchAll)
        .await?;
    let rows = res.into_rows().expect("rows");
    assert_eq!(rows.results[0].get("label"), Some(&RowValues::Text("one".into())));
    assert!(rows.results[0].get("missing").is_some_and(RowValues::is_null));
    Ok(())
}

#[tokio::test]
async fn prepared_statements_are_reusable() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    let insert = conn.prepare("INSERT INTO t (x) VALUES (?1)").await?;
    for x in 0..5 {
        insert.run(&[SqlValue::from(x)]).await?;
    }
    conn.run(&insert, &[SqlValue::from(99)]).await?;

    let select = conn.prepare("SELECT x FROM t WHERE x >= ?1 ORDER BY x").await?;
    let rows = select.all(&[SqlValue::from(3)]).await?;
    assert_eq!(rows.len(), 3);
    assert_eq!(count_rows(&conn).await?, 6);
    Ok(())
}

#[tokio::test]
async fn prepared_statement_rejected_on_other_connection() -> Result<(), Box<dyn std::error::Error>> {
    let a = setup().await?;
    let b = setup().await?;
    let stmt = a.prepare("SELECT x FROM t").await?;
    let err = b.all(&stmt, &[]).await.unwrap_err();
    assert!(matches!(err, SqliteGatewayError::ForeignStatement { .. }));
    Ok(())
}

#[tokio::test]
async fn prepare_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    let err = conn.prepare("SELECT nope FROM missing").await.unwrap_err();
    assert!(matches!(err, SqliteGatewayError::StatementPrepare { .. }));

    let err = conn.all("SELEC x FROM t", &[]).await.unwrap_err();
    match err {
        SqliteGatewayError::StatementPrepare { sql, .. } => assert_eq!(sql, "SELEC x FROM t"),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn constraint_violation_is_execution_error() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    conn.run("INSERT INTO t (label) VALUES (?)", &[SqlValue::from("dup")])
        .await?;
    let err = conn
        .run("INSERT INTO t (label) VALUES (?)", &[SqlValue::from("dup")])
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteGatewayError::StatementExecution { .. }));
    assert!(err.engine_error().is_some());
    Ok(())
}

#[tokio::test]
async fn untyped_params_are_validated_before_execution() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;

    conn.execute_untyped(
        "INSERT INTO t (x, label) VALUES (?, ?)",
        &[json!(7), json!("seven")],
        ExecuteMode::Mutation,
    )
    .await?;
    conn.execute_untyped(
        "INSERT INTO t (x, label) VALUES (?, ?)",
        &[json!(null), json!("nothing")],
        ExecuteMode::Mutation,
    )
    .await?;

    let err = conn
        .execute_untyped(
            "INSERT INTO t (x, label) VALUES (?, ?)",
            &[json!(true), json!("flag")],
            ExecuteMode::Mutation,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteGatewayError::InvalidParameterType { .. }));
    assert_eq!(count_rows(&conn).await?, 2);
    Ok(())
}

#[tokio::test]
async fn script_runs_multiple_statements() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    conn.execute_script(
        "INSERT INTO t (x) VALUES (1);
         INSERT INTO t (x) VALUES (2);
         CREATE INDEX idx_t_x ON t(x);",
    )
    .await?;
    assert_eq!(count_rows(&conn).await?, 2);

    let err = conn
        .execute_script("INSERT INTO t (x) VALUES (3); INSERT INTO nowhere VALUES (1);")
        .await
        .unwrap_err();
    assert!(matches!(err, SqliteGatewayError::ScriptExecution { .. }));
    Ok(())
}

async fn insert_through<E: AsyncStatementExecutor + Sync>(
    exec: &E,
    x: i64,
) -> Result<MutationResult, SqliteGatewayError> {
    exec.execute_dml("INSERT INTO t (x) VALUES (?)", &[SqlValue::from(x)])
        .await
}

#[tokio::test]
async fn trait_surface_delegates_to_connection() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    insert_through(&conn, 10).await?;
    conn.execute_batch("INSERT INTO t (x) VALUES (11)").await?;
    let rows = conn
        .execute_select("SELECT x FROM t ORDER BY x", &[])
        .await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn column_types_read_back_as_row_values() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup().await?;
    let rows = conn
        .all("SELECT x'DEAD' AS b, 2.5 AS f, 7 AS i, NULL AS n", &[])
        .await?;
    let row = &rows.results[0];
    assert_eq!(row.get("b").and_then(RowValues::as_blob), Some(&[0xde, 0xad][..]));
    assert_eq!(row.get("f").and_then(RowValues::as_float), Some(2.5));
    assert_eq!(row.get("i").and_then(RowValues::as_float), Some(7.0));
    assert!(row.get("n").is_some_and(RowValues::is_null));
    Ok(())
}
