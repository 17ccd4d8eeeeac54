use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use duck_middleware::prelude::*;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let buf = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

struct CapturedLogsGuard {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogsGuard;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedLogsGuard {
            buf: Arc::clone(&self.buf),
        }
    }
}

impl Write for CapturedLogsGuard {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Ok(mut buf) = self.buf.lock() {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn count(conn: &DuckDbConnection, table: &str) -> Result<i64, DuckMiddlewareDbError> {
    let mut rs = conn.query(&format!("SELECT count(*) FROM {table}"))?;
    rs.next();
    let n = rs.get_long(1)?;
    rs.close();
    Ok(n)
}

#[test]
fn every_staged_tuple_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE users (id INTEGER, name VARCHAR)")?;

    let rows: Vec<(i32, String)> = (0..25).map(|i| (i, format!("user-{i}"))).collect();
    let result = conn.with_batch("INSERT INTO users VALUES (?, ?)", |batch| {
        batch.add_batch(rows)?;
        assert_eq!(batch.len(), 25);
        let result = batch.execute_batch();
        assert!(batch.is_empty());
        Ok(result)
    })?;

    assert_eq!(result.total_operations(), 25);
    assert_eq!(result.success_count() + result.failure_count(), 25);
    assert!(result.all_succeeded());
    assert_eq!(result.total_rows_affected(), 25);
    assert!(result.update_counts().iter().all(|&c| c == 1));
    assert_eq!(count(&conn, "users")?, 25);
    Ok(())
}

#[test]
fn duplicate_key_fails_only_its_operation() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE uniq (id INTEGER PRIMARY KEY, label VARCHAR)")?;

    let mut batch = conn.create_batch("INSERT INTO uniq VALUES (?, ?)")?;
    batch
        .add((1, "one"))?
        .add((2, "two"))?
        .add((1, "again"))?
        .add((3, "three"))?;
    let result = batch.execute_batch();
    batch.close();

    assert_eq!(result.total_operations(), 4);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.success_count(), 3);
    assert!(!result.all_succeeded());
    assert_eq!(result.update_counts()[2], EXECUTE_FAILED);
    assert!(result.update_counts()[2] < 0);

    let non_negative: i64 = result.update_counts().iter().filter(|&&c| c >= 0).sum();
    assert_eq!(result.total_rows_affected(), non_negative);
    assert_eq!(count(&conn, "uniq")?, 3);
    Ok(())
}

#[test]
fn cleared_batch_runs_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE t (v INTEGER)")?;

    conn.with_batch("INSERT INTO t VALUES (?)", |batch| {
        batch.add_batch([(1,), (2,), (3,)])?;
        batch.clear_batch();
        assert!(batch.is_empty());

        let result = batch.execute_batch();
        assert_eq!(result.total_operations(), 0);
        assert!(result.all_succeeded());

        batch.add((4,))?;
        assert_eq!(batch.execute_batch().total_rows_affected(), 1);
        Ok(())
    })?;

    assert_eq!(count(&conn, "t")?, 1);
    Ok(())
}

#[test]
fn batch_update_counts_reflect_matched_rows() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute(
        "CREATE TABLE grp (g INTEGER, v INTEGER); INSERT INTO grp VALUES (1, 0), (1, 0), (2, 0);",
    )?;

    let result = conn.with_batch("UPDATE grp SET v = ? WHERE g = ?", |batch| {
        batch.add_batch([(10, 1), (20, 2), (30, 3)])?;
        Ok(batch.execute_batch())
    })?;

    assert_eq!(result.update_counts(), &[2, 1, 0]);
    assert_eq!(result.total_rows_affected(), 3);
    assert!(result.all_succeeded());
    Ok(())
}

#[test]
fn batch_inside_transaction_commits_together() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE ledger (id INTEGER, amount DOUBLE)")?;

    let result = conn.with_transaction(|tx| {
        tx.with_batch("INSERT INTO ledger VALUES (?, ?)", |batch| {
            batch.add_batch((1..=10_i32).map(|i| (i, f64::from(i) * 1.5)))?;
            Ok(batch.execute_batch())
        })
    })?;
    assert!(result.all_succeeded());
    assert_eq!(result.total_operations(), 10);
    assert_eq!(count(&conn, "ledger")?, 10);

    // a rejected transaction discards the whole batch
    let err = conn
        .with_transaction(|tx| -> Result<(), DuckMiddlewareDbError> {
            tx.with_batch("INSERT INTO ledger VALUES (?, ?)", |batch| {
                batch.add_batch([(11, 1.0), (12, 2.0)])?;
                batch.execute_batch();
                Ok(())
            })?;
            Err(DuckMiddlewareDbError::invalid_state("abandon"))
        })
        .unwrap_err();
    assert_eq!(err.message(), "abandon");
    assert_eq!(count(&conn, "ledger")?, 10);
    Ok(())
}

#[test]
fn staging_requires_every_parameter() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE pair (a INTEGER, b INTEGER)")?;

    let mut batch = conn.create_batch("INSERT INTO pair VALUES (?, ?)")?;
    assert_eq!(batch.sql(), "INSERT INTO pair VALUES (?, ?)");
    // too few values
    let err = batch.add((1,)).unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::QueryError { .. }));
    // too many values
    let err = batch.add((1, 2, 3)).unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::QueryError { .. }));
    assert!(batch.is_empty());
    batch.close();
    Ok(())
}

#[test]
fn failed_operation_is_logged_as_warning() -> Result<(), Box<dyn std::error::Error>> {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let run = || -> Result<BatchResult, DuckMiddlewareDbError> {
        let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
        conn.execute("CREATE TABLE once (id INTEGER PRIMARY KEY)")?;
        conn.with_batch("INSERT INTO once VALUES (?)", |batch| {
            batch.add_batch([(1,), (1,)])?;
            Ok(batch.execute_batch())
        })
    };
    let result = tracing::subscriber::with_default(subscriber, run)?;

    assert_eq!(result.update_counts(), &[1, EXECUTE_FAILED]);
    let text = logs.contents();
    assert!(text.contains("WARN"), "{text}");
    assert!(text.contains("batched operation failed"), "{text}");
    Ok(())
}

#[test]
fn add_batch_stops_at_first_bad_tuple() -> Result<(), Box<dyn std::error::Error>> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute("CREATE TABLE pair (a INTEGER, b VARCHAR)")?;

    let rows = vec![
        vec![RowValues::Int(1), RowValues::Text("one".into())],
        vec![RowValues::Int(2), RowValues::Text("two".into())],
        // missing the second value
        vec![RowValues::Int(3)],
        vec![RowValues::Int(4), RowValues::Text("four".into())],
    ];

    let mut batch = conn.create_batch("INSERT INTO pair VALUES (?, ?)")?;
    let err = batch.add_batch(rows).unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::QueryError { .. }));
    assert!(err.message().contains("parameter 2 is not bound"));
    assert_eq!(batch.len(), 2);

    let result = batch.execute_batch();
    batch.close();
    assert_eq!(result.update_counts(), &[1, 1]);

    let rows = conn.query("SELECT a FROM pair ORDER BY a")?.into_rows();
    let ids: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("a").and_then(RowValues::as_int).copied())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    Ok(())
}
