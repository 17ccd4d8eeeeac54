use std::cell::Cell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use duckdb::Connection;
use tracing::{debug, instrument, warn};

use crate::config::{DatabaseMode, DuckDbOptions};
use crate::error::{DuckMiddlewareDbError, ErrorCause, panic_message};

/// Owns one native `DuckDB` connection.
///
/// Statements, batches and result sets borrow the connection, so they are
/// always released before it can be closed. After [`close`] every operation
/// fails with `InvalidState`.
///
/// [`close`]: DuckDbConnection::close
pub struct DuckDbConnection {
    pub(super) conn: Option<Connection>,
    options: Arc<DuckDbOptions>,
    pub(super) auto_commit: Cell<bool>,
    // set while a with_transaction body runs
    pub(super) in_block: Cell<bool>,
}

impl DuckDbConnection {
    /// Open a connection described by `options`.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConfigError` if the options are invalid
    /// or the driver rejects a property, and `ConnectionError` if the database
    /// cannot be opened.
    #[instrument(skip(options), fields(url = %options.connection_string()))]
    pub fn connect(options: &DuckDbOptions) -> Result<Self, DuckMiddlewareDbError> {
        options.validate()?;
        let config = options.driver_config()?;

        let conn = match options.mode() {
            DatabaseMode::InMemory => Connection::open_in_memory_with_flags(config),
            DatabaseMode::Persistent(path) => Connection::open_with_flags(path, config),
        }
        .map_err(|e| {
            DuckMiddlewareDbError::connection(
                format!("failed to open {}", options.connection_string()),
                Some(ErrorCause::DuckDb(e)),
            )
        })?;

        debug!(
            read_only = options.read_only(),
            stream_results = options.stream_results(),
            "opened DuckDB connection"
        );
        Ok(Self {
            conn: Some(conn),
            options: Arc::new(options.clone()),
            auto_commit: Cell::new(true),
            in_block: Cell::new(false),
        })
    }

    /// Open a connection, run `body`, and close the connection on every exit path.
    ///
    /// An error returned by `body` is passed through unchanged; a panic inside
    /// `body` becomes a `ConnectionError`. A close failure is reported only when
    /// `body` succeeded.
    ///
    /// # Errors
    /// Returns connect failures, the body's error, or a close failure.
    pub fn with_connection<T, F>(
        options: &DuckDbOptions,
        body: F,
    ) -> Result<T, DuckMiddlewareDbError>
    where
        F: FnOnce(&DuckDbConnection) -> Result<T, DuckMiddlewareDbError>,
    {
        let mut conn = Self::connect(options)?;
        let outcome = catch_unwind(AssertUnwindSafe(|| body(&conn)));
        let closed = conn.close();

        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(err)) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "close after failed body also failed");
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "close after panicked body also failed");
                }
                Err(DuckMiddlewareDbError::connection(
                    "connection body panicked",
                    Some(ErrorCause::Panic(panic_message(&*payload))),
                ))
            }
        }
    }

    /// Close the native connection. Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConnectionError` if the driver fails to close.
    pub fn close(&mut self) -> Result<(), DuckMiddlewareDbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_conn, e)| {
            DuckMiddlewareDbError::connection(
                "failed to close connection",
                Some(ErrorCause::DuckDb(e)),
            )
        })?;
        debug!("closed DuckDB connection");
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Open an independent connection to the same database instance.
    ///
    /// # Errors
    /// Returns `InvalidState` if this connection is closed and
    /// `ConnectionError` if the driver cannot duplicate it.
    pub fn duplicate(&self) -> Result<Self, DuckMiddlewareDbError> {
        let conn = self.native()?.try_clone().map_err(|e| {
            DuckMiddlewareDbError::connection(
                "failed to duplicate connection",
                Some(ErrorCause::DuckDb(e)),
            )
        })?;
        debug!("duplicated DuckDB connection");
        Ok(Self {
            conn: Some(conn),
            options: Arc::clone(&self.options),
            auto_commit: Cell::new(true),
            in_block: Cell::new(false),
        })
    }

    #[must_use]
    pub fn options(&self) -> &DuckDbOptions {
        &self.options
    }

    #[must_use]
    pub fn connection_string(&self) -> String {
        self.options.connection_string()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.options.read_only()
    }

    pub(crate) fn native(&self) -> Result<&Connection, DuckMiddlewareDbError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DuckMiddlewareDbError::invalid_state("connection is closed"))
    }
}

impl fmt::Debug for DuckDbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbConnection")
            .field("url", &self.options.connection_string())
            .field("closed", &self.is_closed())
            .field("auto_commit", &self.auto_commit.get())
            .finish()
    }
}
