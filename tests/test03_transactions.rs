use duck_middleware::prelude::*;

fn setup() -> Result<DuckDbConnection, DuckMiddlewareDbError> {
    let conn = DuckDbConnection::connect(&DuckDbOptions::in_memory())?;
    conn.execute(
        "CREATE TABLE acct (id INTEGER PRIMARY KEY, balance INTEGER); \
         INSERT INTO acct VALUES (1, 100), (2, 50);",
    )?;
    Ok(conn)
}

fn balance(conn: &DuckDbConnection, id: i32) -> Result<i64, DuckMiddlewareDbError> {
    let mut stmt = conn.prepare("SELECT balance FROM acct WHERE id = ?")?;
    stmt.set_int(1, id)?;
    let mut rs = stmt.execute_query()?;
    let value = if rs.next() { rs.get_long(1)? } else { -1 };
    rs.close();
    Ok(value)
}

#[test]
fn committed_transaction_is_visible() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let moved = conn.with_transaction(|tx| {
        assert!(!tx.auto_commit());
        tx.execute_update("UPDATE acct SET balance = balance - 30 WHERE id = 1")?;
        tx.execute_update("UPDATE acct SET balance = balance + 30 WHERE id = 2")
    })?;
    assert_eq!(moved, 1);
    assert!(conn.auto_commit());

    assert_eq!(balance(&conn, 1)?, 70);
    assert_eq!(balance(&conn, 2)?, 80);
    Ok(())
}

#[test]
fn body_error_rolls_back_and_passes_through() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let err = conn
        .with_transaction(|tx| -> Result<(), DuckMiddlewareDbError> {
            tx.execute_update("UPDATE acct SET balance = 0 WHERE id = 1")?;
            Err(DuckMiddlewareDbError::invalid_state("insufficient funds"))
        })
        .unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::InvalidState { .. }));
    assert_eq!(err.message(), "insufficient funds");

    assert_eq!(balance(&conn, 1)?, 100);
    assert!(conn.auto_commit());
    Ok(())
}

#[test]
fn failing_statement_rolls_back_earlier_work() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let err = conn
        .with_transaction(|tx| {
            tx.execute_update("UPDATE acct SET balance = 1 WHERE id = 2")?;
            // duplicate primary key
            tx.execute_update("INSERT INTO acct VALUES (1, 5)")
        })
        .unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::QueryError { .. }));
    assert_eq!(balance(&conn, 2)?, 50);
    Ok(())
}

#[test]
fn panic_rolls_back_and_reports_transaction_error() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let err = conn
        .with_transaction(|tx| -> Result<(), DuckMiddlewareDbError> {
            tx.execute_update("DELETE FROM acct")?;
            panic!("lost power");
        })
        .unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::TransactionError { .. }));
    assert!(matches!(err.cause(), Some(ErrorCause::Panic(msg)) if msg == "lost power"));

    assert!(conn.auto_commit());
    assert_eq!(balance(&conn, 1)?, 100);
    Ok(())
}

#[test]
fn auto_commit_resumes_after_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;
    conn.with_transaction(|tx| tx.execute("UPDATE acct SET balance = 10 WHERE id = 1"))?;

    // standalone statement after the block commits on its own
    conn.execute_update("UPDATE acct SET balance = 11 WHERE id = 1")?;
    let reader = conn.duplicate()?;
    assert_eq!(balance(&reader, 1)?, 11);
    Ok(())
}

#[test]
fn nested_transaction_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let err = conn
        .with_transaction(|outer| {
            outer.execute_update("UPDATE acct SET balance = 0 WHERE id = 1")?;
            outer.with_transaction(|inner| {
                inner.execute_update("UPDATE acct SET balance = 0 WHERE id = 2")
            })
        })
        .unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::TransactionError { .. }));
    assert!(conn.auto_commit());

    assert_eq!(balance(&conn, 1)?, 100);
    assert_eq!(balance(&conn, 2)?, 50);
    Ok(())
}

#[test]
fn manual_commit_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    conn.set_auto_commit(false)?;
    assert!(!conn.auto_commit());

    conn.execute_update("UPDATE acct SET balance = 1 WHERE id = 1")?;
    conn.rollback()?;
    assert_eq!(balance(&conn, 1)?, 100);

    conn.execute_update("UPDATE acct SET balance = 2 WHERE id = 1")?;
    conn.commit()?;
    assert_eq!(balance(&conn, 1)?, 2);

    // re-enabling commits the work in progress
    conn.execute_update("UPDATE acct SET balance = 3 WHERE id = 1")?;
    conn.set_auto_commit(true)?;
    assert!(conn.auto_commit());
    let reader = conn.duplicate()?;
    assert_eq!(balance(&reader, 1)?, 3);
    Ok(())
}

#[test]
fn commit_requires_manual_mode() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;

    let err = conn.commit().unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::InvalidState { .. }));
    let err = conn.rollback().unwrap_err();
    assert!(matches!(err, DuckMiddlewareDbError::InvalidState { .. }));

    // switching to the current mode is a no-op
    conn.set_auto_commit(true)?;
    assert!(conn.auto_commit());
    Ok(())
}

#[test]
fn transaction_block_joins_manual_mode() -> Result<(), Box<dyn std::error::Error>> {
    let conn = setup()?;
    conn.set_auto_commit(false)?;

    conn.with_transaction(|tx| {
        tx.execute_update("UPDATE acct SET balance = 5 WHERE id = 1")
    })?;
    assert!(!conn.auto_commit());
    // committed by the block, so a second connection sees it
    let reader = conn.duplicate()?;
    assert_eq!(balance(&reader, 1)?, 5);

    let err = conn
        .with_transaction(|tx| -> Result<(), DuckMiddlewareDbError> {
            tx.execute_update("UPDATE acct SET balance = 6 WHERE id = 1")?;
            Err(DuckMiddlewareDbError::invalid_state("undo"))
        })
        .unwrap_err();
    assert_eq!(err.message(), "undo");
    assert_eq!(balance(&conn, 1)?, 5);

    // a transaction is open again, so manual commit still works
    conn.execute_update("UPDATE acct SET balance = 7 WHERE id = 1")?;
    conn.commit()?;
    assert_eq!(balance(&reader, 1)?, 7);
    assert!(!conn.auto_commit());
    Ok(())
}
