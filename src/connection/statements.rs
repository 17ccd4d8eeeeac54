use std::sync::Arc;

use tracing::{debug, instrument};

use super::DuckDbConnection;
use crate::batch::Batch;
use crate::error::{DuckMiddlewareDbError, ErrorCause};
use crate::prepared::DuckDbPreparedStatement;
use crate::results::ResultSet;

impl DuckDbConnection {
    /// Run one or more `;`-separated statements, discarding any results.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `QueryError` if the driver rejects the SQL.
    #[instrument(skip(self), fields(sql = %sql))]
    pub fn execute(&self, sql: &str) -> Result<(), DuckMiddlewareDbError> {
        self.native()?.execute_batch(sql).map_err(|e| {
            DuckMiddlewareDbError::query("execution failed", sql, Some(ErrorCause::DuckDb(e)))
        })?;
        debug!("executed batch");
        Ok(())
    }

    /// Run a single parameterless DML statement and return the affected-row count.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `QueryError` if the driver rejects the SQL.
    #[instrument(skip(self), fields(sql = %sql))]
    pub fn execute_update(&self, sql: &str) -> Result<usize, DuckMiddlewareDbError> {
        let affected = self.native()?.execute(sql, []).map_err(|e| {
            DuckMiddlewareDbError::query(
                "update execution failed",
                sql,
                Some(ErrorCause::DuckDb(e)),
            )
        })?;
        debug!(affected, "executed update");
        Ok(affected)
    }

    /// Run a parameterless query. The result set owns its statement.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `QueryError` if preparing or executing fails.
    pub fn query(&self, sql: &str) -> Result<ResultSet<'_>, DuckMiddlewareDbError> {
        self.prepare(sql)?.execute_query()
    }

    /// Prepare a statement for binding and repeated execution.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `QueryError` if the driver rejects the SQL.
    pub fn prepare(&self, sql: &str) -> Result<DuckDbPreparedStatement<'_>, DuckMiddlewareDbError> {
        let stmt = self.native()?.prepare(sql).map_err(|e| {
            DuckMiddlewareDbError::query("prepare failed", sql, Some(ErrorCause::DuckDb(e)))
        })?;
        Ok(DuckDbPreparedStatement::new(stmt, Arc::new(sql.to_owned())))
    }

    /// Prepare a statement for batched execution.
    ///
    /// # Errors
    /// Same as [`prepare`](DuckDbConnection::prepare).
    pub fn create_batch(&self, sql: &str) -> Result<Batch<'_>, DuckMiddlewareDbError> {
        Ok(Batch::new(self.prepare(sql)?))
    }

    /// Prepare `sql`, hand the statement to `body`, and close it afterwards.
    ///
    /// # Errors
    /// Returns the prepare failure or whatever `body` returns.
    pub fn with_statement<T, F>(&self, sql: &str, body: F) -> Result<T, DuckMiddlewareDbError>
    where
        F: FnOnce(&mut DuckDbPreparedStatement<'_>) -> Result<T, DuckMiddlewareDbError>,
    {
        let mut stmt = self.prepare(sql)?;
        let outcome = body(&mut stmt);
        stmt.close();
        outcome
    }

    /// Create a batch for `sql`, hand it to `body`, and close it afterwards.
    ///
    /// # Errors
    /// Returns the prepare failure or whatever `body` returns.
    pub fn with_batch<T, F>(&self, sql: &str, body: F) -> Result<T, DuckMiddlewareDbError>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T, DuckMiddlewareDbError>,
    {
        let mut batch = self.create_batch(sql)?;
        let outcome = body(&mut batch);
        batch.close();
        outcome
    }
}
