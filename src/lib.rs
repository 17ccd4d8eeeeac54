//! Synchronous, typed wrappers around the `duckdb` driver.
//!
//! Every operation returns [`DuckMiddlewareDbError`] instead of leaking driver
//! errors, and every scoped entry point (`with_connection`, `with_transaction`,
//! `with_statement`, `with_batch`) releases its resource on all exit paths.
//!
//! ```rust,no_run
//! use duck_middleware::prelude::*;
//!
//! # fn main() -> Result<(), DuckMiddlewareDbError> {
//! DuckDbConnection::with_connection(&DuckDbOptions::in_memory(), |conn| {
//!     conn.execute("CREATE TABLE t (id INT, name VARCHAR)")?;
//!     conn.with_batch("INSERT INTO t VALUES (?, ?)", |batch| {
//!         batch.add_batch([(1, "Alice"), (2, "Bob")])?;
//!         Ok(batch.execute_batch())
//!     })?;
//!
//!     let mut rs = conn.query("SELECT id, name FROM t ORDER BY id")?;
//!     while rs.next() {
//!         println!("{} {:?}", rs.get_int(1)?, rs.get_string("name")?);
//!     }
//!     rs.close();
//!     Ok(())
//! })
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod connection;
pub mod error;
pub mod params;
pub mod prelude;
pub mod prepared;
pub mod query;
pub mod results;
pub mod types;

pub use batch::{Batch, BatchResult};
pub use config::{DatabaseMode, DuckDbOptions, DuckDbOptionsBuilder};
pub use connection::DuckDbConnection;
pub use error::{DuckMiddlewareDbError, ErrorCause};
pub use params::{BindParam, BindParams};
pub use prepared::{DuckDbPreparedStatement, EXECUTE_FAILED};
pub use results::{ColumnIndex, CustomDbRow, ResultSet};
pub use types::{RowValues, SqlType};
