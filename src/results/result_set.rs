use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use super::row::{CustomDbRow, index_columns};
use crate::error::DuckMiddlewareDbError;
use crate::prepared::DuckDbPreparedStatement;
use crate::types::RowValues;

/// Column selector for the typed readers: a 1-based position or a column name.
pub trait ColumnIndex {
    /// Resolve to a 0-based position within `row`.
    fn resolve(&self, row: &CustomDbRow) -> Option<usize>;

    /// How the column is named in error messages.
    fn describe(&self) -> String;
}

impl ColumnIndex for usize {
    fn resolve(&self, row: &CustomDbRow) -> Option<usize> {
        (*self >= 1 && *self <= row.rows.len()).then(|| *self - 1)
    }

    fn describe(&self) -> String {
        format!("#{self}")
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, row: &CustomDbRow) -> Option<usize> {
        row.get_column_index(self)
    }

    fn describe(&self) -> String {
        format!("'{self}'")
    }
}

impl ColumnIndex for String {
    fn resolve(&self, row: &CustomDbRow) -> Option<usize> {
        row.get_column_index(self)
    }

    fn describe(&self) -> String {
        format!("'{self}'")
    }
}

/// Forward-only cursor over a query result.
///
/// Owns the statement that produced it; closing or dropping the result set
/// releases the cursor first and then that statement.
pub struct ResultSet<'conn> {
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
    pending: std::vec::IntoIter<Vec<RowValues>>,
    current: Option<CustomDbRow>,
    row_number: usize,
    was_null: Cell<bool>,
    // cleanup only; never used to run queries
    statement: Option<DuckDbPreparedStatement<'conn>>,
}

impl<'conn> ResultSet<'conn> {
    pub(crate) fn new(
        column_names: Arc<Vec<String>>,
        rows: Vec<Vec<RowValues>>,
        statement: DuckDbPreparedStatement<'conn>,
    ) -> Self {
        let column_index_cache = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            column_index_cache,
            pending: rows.into_iter(),
            current: None,
            row_number: 0,
            was_null: Cell::new(false),
            statement: Some(statement),
        }
    }

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    pub fn next(&mut self) -> bool {
        match self.pending.next() {
            Some(values) => {
                self.current = Some(CustomDbRow::with_cache(
                    Arc::clone(&self.column_names),
                    values,
                    Arc::clone(&self.column_index_cache),
                ));
                self.row_number += 1;
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    /// Whether the last value read was SQL NULL.
    #[must_use]
    pub fn was_null(&self) -> bool {
        self.was_null.get()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// 1-based position of a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.column_index_cache
            .get(name)
            .copied()
            .or_else(|| {
                self.column_names
                    .iter()
                    .position(|col| col.eq_ignore_ascii_case(name))
            })
            .map(|idx| idx + 1)
    }

    /// 1-based number of the current row; 0 before the first `next`.
    #[must_use]
    pub fn row_number(&self) -> usize {
        self.row_number
    }

    /// The row the cursor is positioned on.
    #[must_use]
    pub fn current_row(&self) -> Option<&CustomDbRow> {
        self.current.as_ref()
    }

    fn sql(&self) -> &str {
        self.statement.as_ref().map_or("", |stmt| stmt.sql())
    }

    fn read<C: ColumnIndex>(&self, column: &C) -> Result<&RowValues, DuckMiddlewareDbError> {
        let row = self.current.as_ref().ok_or_else(|| {
            DuckMiddlewareDbError::invalid_state("result set is not positioned on a row")
        })?;
        let idx = column.resolve(row).ok_or_else(|| {
            DuckMiddlewareDbError::query(
                format!("unknown column {}", column.describe()),
                self.sql(),
                None,
            )
        })?;
        let value = &row.rows[idx];
        self.was_null.set(value.is_null());
        Ok(value)
    }

    fn conversion_error<C: ColumnIndex>(
        &self,
        column: &C,
        target: &str,
        value: &RowValues,
    ) -> DuckMiddlewareDbError {
        DuckMiddlewareDbError::query(
            format!("cannot read column {} ({value:?}) as {target}", column.describe()),
            self.sql(),
            None,
        )
    }

    /// # Errors
    /// `InvalidState` when not positioned on a row, `QueryError` for an unknown column.
    pub fn get_value<C: ColumnIndex>(&self, column: C) -> Result<RowValues, DuckMiddlewareDbError> {
        self.read(&column).cloned()
    }

    /// Read an INTEGER; NULL reads as `0`.
    ///
    /// # Errors
    /// `InvalidState` when not positioned on a row, `QueryError` for an unknown
    /// column or a value that does not fit.
    pub fn get_int<C: ColumnIndex>(&self, column: C) -> Result<i32, DuckMiddlewareDbError> {
        let value = self.read(&column)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .coerce_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| self.conversion_error(&column, "INTEGER", value))
    }

    /// Read a BIGINT; NULL reads as `0`.
    ///
    /// # Errors
    /// Same as [`get_int`](ResultSet::get_int).
    pub fn get_long<C: ColumnIndex>(&self, column: C) -> Result<i64, DuckMiddlewareDbError> {
        let value = self.read(&column)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .coerce_i64()
            .ok_or_else(|| self.conversion_error(&column, "BIGINT", value))
    }

    /// Read a DOUBLE; NULL reads as `0.0`.
    ///
    /// # Errors
    /// Same as [`get_int`](ResultSet::get_int).
    pub fn get_double<C: ColumnIndex>(&self, column: C) -> Result<f64, DuckMiddlewareDbError> {
        let value = self.read(&column)?;
        if value.is_null() {
            return Ok(0.0);
        }
        value
            .coerce_f64()
            .ok_or_else(|| self.conversion_error(&column, "DOUBLE", value))
    }

    /// Read a BOOLEAN; NULL reads as `false`.
    ///
    /// # Errors
    /// Same as [`get_int`](ResultSet::get_int).
    pub fn get_boolean<C: ColumnIndex>(&self, column: C) -> Result<bool, DuckMiddlewareDbError> {
        let value = self.read(&column)?;
        if value.is_null() {
            return Ok(false);
        }
        value
            .coerce_bool()
            .ok_or_else(|| self.conversion_error(&column, "BOOLEAN", value))
    }

    /// Read any value as text; NULL reads as `None`.
    ///
    /// # Errors
    /// `InvalidState` when not positioned on a row, `QueryError` for an unknown column.
    pub fn get_string<C: ColumnIndex>(
        &self,
        column: C,
    ) -> Result<Option<String>, DuckMiddlewareDbError> {
        Ok(self.read(&column)?.coerce_string())
    }

    /// Read a TIMESTAMP; NULL reads as `None`.
    ///
    /// # Errors
    /// Same as [`get_int`](ResultSet::get_int).
    pub fn get_timestamp<C: ColumnIndex>(
        &self,
        column: C,
    ) -> Result<Option<NaiveDateTime>, DuckMiddlewareDbError> {
        let value = self.read(&column)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_timestamp()
            .map(Some)
            .ok_or_else(|| self.conversion_error(&column, "TIMESTAMP", value))
    }

    /// Drain the remaining rows, closing the cursor and its statement.
    #[must_use]
    pub fn into_rows(mut self) -> Vec<CustomDbRow> {
        let mut rows = Vec::new();
        while self.next() {
            if let Some(row) = self.current.take() {
                rows.push(row);
            }
        }
        self.close();
        rows
    }

    /// Close the cursor, then the statement that produced it.
    pub fn close(mut self) {
        self.current = None;
        self.pending = Vec::new().into_iter();
        if let Some(statement) = self.statement.take() {
            statement.close();
        }
        debug!(rows_read = self.row_number, "closed result set");
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("column_names", &self.column_names)
            .field("row_number", &self.row_number)
            .field("remaining", &self.pending.len())
            .field("statement", &self.statement)
            .finish()
    }
}
