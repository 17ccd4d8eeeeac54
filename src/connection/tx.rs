use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, instrument, warn};

use super::DuckDbConnection;
use crate::error::{DuckMiddlewareDbError, ErrorCause, panic_message};

const BEGIN: &str = "BEGIN TRANSACTION";
const COMMIT: &str = "COMMIT";
const ROLLBACK: &str = "ROLLBACK";

/// Puts the auto-commit and block flags back when a transaction block ends,
/// however it ends.
struct AutoCommitRestore<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
    in_block: &'a Cell<bool>,
    was_in_block: bool,
}

impl Drop for AutoCommitRestore<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
        self.in_block.set(self.was_in_block);
    }
}

impl DuckDbConnection {
    fn control(&self, sql: &str, message: &str) -> Result<(), DuckMiddlewareDbError> {
        self.native()?
            .execute_batch(sql)
            .map_err(|e| DuckMiddlewareDbError::transaction(message, Some(ErrorCause::DuckDb(e))))
    }

    fn rollback_quietly(&self) {
        if let Err(err) = self.control(ROLLBACK, "rollback failed") {
            warn!(error = %err, "rollback during failure handling failed; keeping original error");
        }
    }

    /// Whether each statement commits on its own.
    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit.get()
    }

    /// Switch auto-commit. Disabling opens a transaction; enabling commits
    /// the open one.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `TransactionError` if the driver
    /// rejects the BEGIN or COMMIT.
    pub fn set_auto_commit(&self, enabled: bool) -> Result<(), DuckMiddlewareDbError> {
        self.native()?;
        if enabled == self.auto_commit.get() {
            return Ok(());
        }
        if enabled {
            self.control(COMMIT, "commit while enabling auto-commit failed")?;
        } else {
            self.control(BEGIN, "failed to begin transaction")?;
        }
        self.auto_commit.set(enabled);
        debug!(enabled, "auto-commit switched");
        Ok(())
    }

    /// Commit the open transaction and start the next one.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed or auto-commit is on, `TransactionError`
    /// if the driver fails.
    pub fn commit(&self) -> Result<(), DuckMiddlewareDbError> {
        self.native()?;
        if self.auto_commit.get() {
            return Err(DuckMiddlewareDbError::invalid_state(
                "commit requires auto-commit to be disabled",
            ));
        }
        self.control(COMMIT, "commit failed")?;
        self.control(BEGIN, "failed to begin transaction after commit")
    }

    /// Roll back the open transaction and start the next one.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed or auto-commit is on, `TransactionError`
    /// if the driver fails.
    pub fn rollback(&self) -> Result<(), DuckMiddlewareDbError> {
        self.native()?;
        if self.auto_commit.get() {
            return Err(DuckMiddlewareDbError::invalid_state(
                "rollback requires auto-commit to be disabled",
            ));
        }
        self.control(ROLLBACK, "rollback failed")?;
        self.control(BEGIN, "failed to begin transaction after rollback")
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` returns `Ok`. Rolls back when it returns `Err` (the
    /// error is passed through) or panics (reported as `TransactionError`).
    /// The auto-commit mode in effect before the call is restored on every path.
    ///
    /// With auto-commit already off the body joins the open transaction, which
    /// is then committed or rolled back and a fresh one begun, as with
    /// [`commit`](Self::commit) and [`rollback`](Self::rollback).
    ///
    /// Nesting is not checked up front: the engine refuses the inner BEGIN and
    /// that refusal comes back as `TransactionError` without touching the outer
    /// transaction.
    ///
    /// # Errors
    /// Returns `InvalidState` if closed, `TransactionError` for BEGIN/COMMIT
    /// failures or a panic, otherwise the body's own error.
    #[instrument(skip(self, body))]
    pub fn with_transaction<T, F>(&self, body: F) -> Result<T, DuckMiddlewareDbError>
    where
        F: FnOnce(&DuckDbConnection) -> Result<T, DuckMiddlewareDbError>,
    {
        let previous = self.auto_commit.get();
        let was_in_block = self.in_block.get();
        // only a transaction opened by set_auto_commit(false) is joined
        let joins_manual = !previous && !was_in_block;
        if joins_manual {
            self.native()?;
        } else {
            self.control(BEGIN, "failed to begin transaction")?;
        }
        let _restore = AutoCommitRestore {
            flag: &self.auto_commit,
            previous,
            in_block: &self.in_block,
            was_in_block,
        };
        self.auto_commit.set(false);
        self.in_block.set(true);

        let outcome = match catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(Ok(value)) => match self.control(COMMIT, "commit failed") {
                Ok(()) => {
                    debug!("transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    self.rollback_quietly();
                    Err(err)
                }
            },
            Ok(Err(err)) => {
                debug!(error = %err, "transaction body failed; rolling back");
                self.rollback_quietly();
                Err(err)
            }
            Err(payload) => {
                self.rollback_quietly();
                Err(DuckMiddlewareDbError::transaction(
                    "transaction body panicked",
                    Some(ErrorCause::Panic(panic_message(&*payload))),
                ))
            }
        };

        // manual mode always has a transaction open
        if joins_manual {
            if let Err(err) = self.control(BEGIN, "failed to begin transaction after block") {
                if outcome.is_ok() {
                    return Err(err);
                }
                warn!(error = %err, "re-opening manual transaction failed; keeping original error");
            }
        }
        outcome
    }
}
