// DuckDB connection wrapper, split by concern:
// - core: open/close/duplicate and scoped acquisition
// - statements: one-shot SQL, prepared statements and batches
// - tx: auto-commit switching and transaction bracketing

mod core;
mod statements;
mod tx;

pub use self::core::DuckDbConnection;
