//! Criterion comparison of insert throughput with and without async-unit
//! batching. Autocommit pays one journal sync per statement; running the same
//! inserts inside `run_async_unit` coalesces them into one transaction.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sqlite_gateway::prelude::*;
use std::hint::black_box;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const INSERT: &str = "INSERT INTO bench (name, score) VALUES (?1, ?2)";

static TOKIO_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("create tokio runtime"));

// Keeps the database files alive for the whole run.
static SCRATCH: LazyLock<TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("create scratch dir"));

/// Resolve how many inserts each iteration performs.
fn insert_count() -> usize {
    std::env::var("BENCH_ROWS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(200)
}

fn db_path(name: &str) -> PathBuf {
    SCRATCH.path().join(name)
}

async fn fresh_connection(name: &str) -> Result<SqliteConnection, SqliteGatewayError> {
    let conn = SqliteOptionsBuilder::new(db_path(name))
        .busy_timeout(Duration::from_secs(5))
        .open()
        .await?;
    conn.execute_script(
        "CREATE TABLE IF NOT EXISTS bench (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL,
            score REAL NOT NULL
        );",
    )
    .await?;
    Ok(conn)
}

fn row_params(i: usize) -> [SqlValue; 2] {
    #[allow(clippy::cast_precision_loss)]
    let score = i as f64 * 0.5;
    [SqlValue::from(format!("name-{i}")), SqlValue::from(score)]
}

async fn insert_autocommit(conn: &SqliteConnection, rows: usize) -> Result<(), SqliteGatewayError> {
    for i in 0..rows {
        black_box(conn.run(INSERT, &row_params(i)).await?);
    }
    Ok(())
}

async fn insert_batched(conn: &SqliteConnection, rows: usize) -> Result<(), SqliteGatewayError> {
    conn.run_async_unit(|c| async move {
        for i in 0..rows {
            black_box(c.run(INSERT, &row_params(i)).await?);
        }
        Ok(())
    })
    .await
}

async fn insert_sync_unit(conn: &SqliteConnection, rows: usize) -> Result<(), SqliteGatewayError> {
    conn.run_sync_unit(move |unit| {
        for i in 0..rows {
            black_box(unit.run(INSERT, &row_params(i))?);
        }
        Ok(())
    })
    .await
}

fn bench_inserts(c: &mut Criterion) {
    let runtime = &*TOKIO_RUNTIME;
    let rows = insert_count();

    let mut group = c.benchmark_group("inserts");
    group.throughput(Throughput::Elements(rows as u64));
    group.sample_size(10);

    let conn = runtime
        .block_on(fresh_connection("autocommit.db"))
        .expect("open autocommit db");
    group.bench_function(BenchmarkId::new("autocommit", rows), |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::default();
            for _ in 0..iters {
                let start = Instant::now();
                runtime
                    .block_on(insert_autocommit(&conn, rows))
                    .expect("autocommit inserts");
                total += start.elapsed();
            }
            total
        });
    });

    let conn = runtime
        .block_on(fresh_connection("async_unit.db"))
        .expect("open async unit db");
    let batched = &conn;
    group.bench_function(BenchmarkId::new("async_unit", rows), |b| {
        b.to_async(runtime)
            .iter(|| async move { insert_batched(batched, rows).await.expect("batched inserts") });
    });

    let conn = runtime
        .block_on(fresh_connection("sync_unit.db"))
        .expect("open sync unit db");
    let sync = &conn;
    group.bench_function(BenchmarkId::new("sync_unit", rows), |b| {
        b.to_async(runtime)
            .iter(|| async move { insert_sync_unit(sync, rows).await.expect("sync unit inserts") });
    });

    group.finish();
}

fn configure() -> Criterion {
    Criterion::default().warm_up_time(Duration::from_millis(500))
}

criterion_group! {
    name = benches;
    config = configure();
    targets = bench_inserts
}
criterion_main!(benches);
