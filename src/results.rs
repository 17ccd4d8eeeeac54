//! Query results: the cursor handed out by query execution and its rows.

pub mod result_set;
pub mod row;

pub use result_set::{ColumnIndex, ResultSet};
pub use row::CustomDbRow;
