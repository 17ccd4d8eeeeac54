use thiserror::Error;

/// Lower-level failure attached to a [`DuckMiddlewareDbError`] for diagnostics.
#[derive(Debug, Error)]
pub enum ErrorCause {
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Payload of a panic caught at a scoped-acquisition boundary.
    #[error("panic: {0}")]
    Panic(String),
}

/// Every fallible operation in this crate returns this error.
///
/// Driver failures are never converted implicitly; each call site picks the
/// variant matching what it was doing and keeps the driver error as the source.
#[derive(Debug, Error)]
pub enum DuckMiddlewareDbError {
    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("Query error: {message} (sql: {sql})")]
    QueryError {
        message: String,
        sql: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("Transaction error: {message}")]
    TransactionError {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("Invalid state: {message}")]
    InvalidState {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },
}

impl DuckMiddlewareDbError {
    pub fn connection(message: impl Into<String>, cause: Option<ErrorCause>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            cause,
        }
    }

    pub fn query(
        message: impl Into<String>,
        sql: impl Into<String>,
        cause: Option<ErrorCause>,
    ) -> Self {
        Self::QueryError {
            message: message.into(),
            sql: sql.into(),
            cause,
        }
    }

    pub fn transaction(message: impl Into<String>, cause: Option<ErrorCause>) -> Self {
        Self::TransactionError {
            message: message.into(),
            cause,
        }
    }

    pub fn config(message: impl Into<String>, cause: Option<ErrorCause>) -> Self {
        Self::ConfigError {
            message: message.into(),
            cause,
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
            cause: None,
        }
    }

    /// Human-readable message without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionError { message, .. }
            | Self::QueryError { message, .. }
            | Self::TransactionError { message, .. }
            | Self::ConfigError { message, .. }
            | Self::InvalidState { message, .. } => message,
        }
    }

    /// The offending SQL, for query failures.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::QueryError { sql, .. } => Some(sql),
            _ => None,
        }
    }

    #[must_use]
    pub fn cause(&self) -> Option<&ErrorCause> {
        match self {
            Self::ConnectionError { cause, .. }
            | Self::QueryError { cause, .. }
            | Self::TransactionError { cause, .. }
            | Self::ConfigError { cause, .. }
            | Self::InvalidState { cause, .. } => cause.as_ref(),
        }
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
