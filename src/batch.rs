use tracing::{debug, instrument};

use crate::error::DuckMiddlewareDbError;
use crate::params::BindParams;
use crate::prepared::DuckDbPreparedStatement;

/// Outcome of one batch execution.
///
/// Non-negative counts are rows affected; negative counts mark failed
/// operations. Aggregates are computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    update_counts: Vec<i64>,
    success_count: usize,
    failure_count: usize,
    total_rows_affected: i64,
}

impl BatchResult {
    #[must_use]
    pub fn from_counts(update_counts: Vec<i64>) -> Self {
        let success_count = update_counts.iter().filter(|c| **c >= 0).count();
        let failure_count = update_counts.len() - success_count;
        let total_rows_affected = update_counts.iter().filter(|c| **c >= 0).sum();
        Self {
            update_counts,
            success_count,
            failure_count,
            total_rows_affected,
        }
    }

    #[must_use]
    pub fn update_counts(&self) -> &[i64] {
        &self.update_counts
    }

    #[must_use]
    pub fn total_operations(&self) -> usize {
        self.update_counts.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    #[must_use]
    pub fn total_rows_affected(&self) -> i64 {
        self.total_rows_affected
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}

/// Deferred bulk execution of one prepared statement.
#[derive(Debug)]
pub struct Batch<'conn> {
    stmt: DuckDbPreparedStatement<'conn>,
}

impl<'conn> Batch<'conn> {
    pub(crate) fn new(stmt: DuckDbPreparedStatement<'conn>) -> Self {
        Self { stmt }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.stmt.sql()
    }

    /// Number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stmt.batch_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind one parameter tuple and stage it.
    ///
    /// # Errors
    /// Returns the binding or staging failure; nothing is staged in that case.
    pub fn add<P: BindParams>(&mut self, params: P) -> Result<&mut Self, DuckMiddlewareDbError> {
        self.stmt.clear_parameters();
        params.bind_all(&mut self.stmt)?;
        self.stmt.add_batch()?;
        Ok(self)
    }

    /// Bind and stage each tuple in order, stopping at the first failure.
    /// Tuples staged before the failure stay staged.
    ///
    /// # Errors
    /// Returns the first binding or staging failure.
    pub fn add_batch<P, I>(&mut self, rows: I) -> Result<&mut Self, DuckMiddlewareDbError>
    where
        P: BindParams,
        I: IntoIterator<Item = P>,
    {
        for params in rows {
            self.add(params)?;
        }
        Ok(self)
    }

    /// Run every staged operation and report per-operation counts.
    #[instrument(skip(self), fields(sql = %self.stmt.sql()))]
    pub fn execute_batch(&mut self) -> BatchResult {
        let result = BatchResult::from_counts(self.stmt.execute_batch());
        debug!(
            total = result.total_operations(),
            failed = result.failure_count(),
            rows = result.total_rows_affected(),
            "executed batch"
        );
        result
    }

    /// Discard staged operations without running them.
    pub fn clear_batch(&mut self) {
        self.stmt.clear_batch();
    }

    /// Close the underlying statement.
    pub fn close(self) {
        self.stmt.close();
    }
}
