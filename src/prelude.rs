//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types
//! to make it easier to get started with the library.

pub use crate::batch::{Batch, BatchResult};
pub use crate::config::{DatabaseMode, DuckDbOptions, DuckDbOptionsBuilder};
pub use crate::connection::DuckDbConnection;
pub use crate::error::{DuckMiddlewareDbError, ErrorCause};
pub use crate::params::{BindParam, BindParams};
pub use crate::prepared::{DuckDbPreparedStatement, EXECUTE_FAILED};
pub use crate::results::{ColumnIndex, CustomDbRow, ResultSet};
pub use crate::types::{RowValues, SqlType};
