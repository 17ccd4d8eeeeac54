use std::sync::Arc;

use chrono::NaiveDateTime;
use duckdb::types::Value;
use duckdb::{Statement, params_from_iter};
use tracing::{debug, instrument, warn};

use crate::error::{DuckMiddlewareDbError, ErrorCause};
use crate::params::{BindParams, format_timestamp, row_value_to_duckdb_value};
use crate::query::build_rows;
use crate::results::ResultSet;
use crate::types::{RowValues, SqlType};

/// Update count recorded for a batched operation that failed.
pub const EXECUTE_FAILED: i64 = -3;

/// Prepared statement owned by the caller until `close` or drop.
///
/// Parameters are 1-based. Binding is cumulative: values stay bound across
/// executions until overwritten or cleared with [`clear_parameters`].
///
/// [`clear_parameters`]: DuckDbPreparedStatement::clear_parameters
pub struct DuckDbPreparedStatement<'conn> {
    stmt: Statement<'conn>,
    sql: Arc<String>,
    bound: Vec<Option<Value>>,
    staged: Vec<Vec<Value>>,
}

impl<'conn> DuckDbPreparedStatement<'conn> {
    pub(crate) fn new(stmt: Statement<'conn>, sql: Arc<String>) -> Self {
        let slots = stmt.parameter_count();
        Self {
            stmt,
            sql,
            bound: vec![None; slots],
            staged: Vec::new(),
        }
    }

    /// Access the raw SQL string of the prepared statement.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql.as_str()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.bound.len()
    }

    fn query_error(
        &self,
        message: impl Into<String>,
        cause: Option<ErrorCause>,
    ) -> DuckMiddlewareDbError {
        DuckMiddlewareDbError::query(message, self.sql.as_str(), cause)
    }

    fn slot(&mut self, index: usize) -> Result<&mut Option<Value>, DuckMiddlewareDbError> {
        let count = self.bound.len();
        if index == 0 || index > count {
            return Err(self.query_error(
                format!("parameter index {index} out of range (statement has {count} parameters)"),
                None,
            ));
        }
        Ok(&mut self.bound[index - 1])
    }

    fn bind_value(&mut self, index: usize, value: Value) -> Result<(), DuckMiddlewareDbError> {
        *self.slot(index)? = Some(value);
        Ok(())
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_int(&mut self, index: usize, value: i32) -> Result<i32, DuckMiddlewareDbError> {
        self.bind_value(index, Value::Int(value))?;
        Ok(value)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_long(&mut self, index: usize, value: i64) -> Result<i64, DuckMiddlewareDbError> {
        self.bind_value(index, Value::BigInt(value))?;
        Ok(value)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_double(&mut self, index: usize, value: f64) -> Result<f64, DuckMiddlewareDbError> {
        self.bind_value(index, Value::Double(value))?;
        Ok(value)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_string(
        &mut self,
        index: usize,
        value: impl Into<String>,
    ) -> Result<String, DuckMiddlewareDbError> {
        let value = value.into();
        self.bind_value(index, Value::Text(value.clone()))?;
        Ok(value)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_boolean(
        &mut self,
        index: usize,
        value: bool,
    ) -> Result<bool, DuckMiddlewareDbError> {
        self.bind_value(index, Value::Boolean(value))?;
        Ok(value)
    }

    /// Bind SQL NULL. The engine infers the parameter type from context, so
    /// `sql_type` is informational.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_null(
        &mut self,
        index: usize,
        sql_type: SqlType,
    ) -> Result<(), DuckMiddlewareDbError> {
        debug!(index, sql_type = sql_type.name(), "binding null");
        self.bind_value(index, Value::Null)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_timestamp(
        &mut self,
        index: usize,
        value: NaiveDateTime,
    ) -> Result<NaiveDateTime, DuckMiddlewareDbError> {
        self.bind_value(index, Value::Text(format_timestamp(&value)))?;
        Ok(value)
    }

    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_blob(
        &mut self,
        index: usize,
        value: Vec<u8>,
    ) -> Result<Vec<u8>, DuckMiddlewareDbError> {
        self.bind_value(index, Value::Blob(value.clone()))?;
        Ok(value)
    }

    /// Bind a dynamic value.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if `index` is out of range.
    pub fn set_value(
        &mut self,
        index: usize,
        value: &RowValues,
    ) -> Result<(), DuckMiddlewareDbError> {
        self.bind_value(index, row_value_to_duckdb_value(value))
    }

    /// Bind a whole parameter list starting at index 1.
    ///
    /// # Errors
    /// Returns the first binding failure.
    pub fn bind<P: BindParams>(&mut self, params: P) -> Result<&mut Self, DuckMiddlewareDbError> {
        params.bind_all(self)?;
        Ok(self)
    }

    /// Reset every bound value.
    pub fn clear_parameters(&mut self) {
        self.bound.iter_mut().for_each(|slot| *slot = None);
    }

    fn bound_values(&self) -> Result<Vec<Value>, DuckMiddlewareDbError> {
        self.bound
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.clone().ok_or_else(|| {
                    self.query_error(format!("parameter {} is not bound", i + 1), None)
                })
            })
            .collect()
    }

    /// Execute the statement as a query. The returned [`ResultSet`] owns this
    /// statement and closes it when closed or dropped.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if a parameter is unbound or
    /// the driver fails to execute the query.
    #[instrument(skip(self), fields(sql = %self.sql))]
    pub fn execute_query(mut self) -> Result<ResultSet<'conn>, DuckMiddlewareDbError> {
        let values = self.bound_values()?;
        let (columns, rows) = build_rows(&mut self.stmt, &values)
            .map_err(|e| self.query_error("query execution failed", Some(ErrorCause::DuckDb(e))))?;
        debug!(rows = rows.len(), "executed query");
        Ok(ResultSet::new(columns, rows, self))
    }

    /// Execute the statement as DML and return the affected-row count.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if a parameter is unbound or
    /// the driver fails to execute the statement.
    #[instrument(skip(self), fields(sql = %self.sql))]
    pub fn execute_update(&mut self) -> Result<usize, DuckMiddlewareDbError> {
        let values = self.bound_values()?;
        let affected = self
            .stmt
            .execute(params_from_iter(values.iter()))
            .map_err(|e| self.query_error("update execution failed", Some(ErrorCause::DuckDb(e))))?;
        debug!(affected, "executed update");
        Ok(affected)
    }

    /// Stage the currently bound values for [`execute_batch`].
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if a parameter is unbound.
    ///
    /// [`execute_batch`]: DuckDbPreparedStatement::execute_batch
    pub fn add_batch(&mut self) -> Result<&mut Self, DuckMiddlewareDbError> {
        let values = self.bound_values()?;
        self.staged.push(values);
        Ok(self)
    }

    /// Number of staged, not yet executed operations.
    #[must_use]
    pub fn batch_len(&self) -> usize {
        self.staged.len()
    }

    /// Discard all staged operations.
    pub fn clear_batch(&mut self) {
        self.staged.clear();
    }

    /// Execute every staged operation in order and clear the batch.
    ///
    /// Each entry is the affected-row count, or [`EXECUTE_FAILED`] when that
    /// operation was rejected. Later operations still run after a failure.
    #[instrument(skip(self), fields(sql = %self.sql, staged = self.staged.len()))]
    pub fn execute_batch(&mut self) -> Vec<i64> {
        let staged = std::mem::take(&mut self.staged);
        let mut counts = Vec::with_capacity(staged.len());
        for (op, values) in staged.iter().enumerate() {
            match self.stmt.execute(params_from_iter(values.iter())) {
                Ok(affected) => counts.push(i64::try_from(affected).unwrap_or(i64::MAX)),
                Err(err) => {
                    warn!(op, error = %err, "batched operation failed");
                    counts.push(EXECUTE_FAILED);
                }
            }
        }
        counts
    }

    /// Release the native statement.
    pub fn close(self) {
        debug!(sql = %self.sql, "closing statement");
        drop(self);
    }
}

impl std::fmt::Debug for DuckDbPreparedStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbPreparedStatement")
            .field("sql", &self.sql)
            .field("bound", &self.bound)
            .field("staged", &self.staged.len())
            .finish()
    }
}
