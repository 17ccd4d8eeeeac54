use chrono::NaiveDateTime;
use duckdb::types::Value;

use crate::error::DuckMiddlewareDbError;
use crate::prepared::DuckDbPreparedStatement;
use crate::types::{RowValues, SqlType};

/// Convert a single `RowValues` to a driver `Value`.
///
/// Timestamps and JSON are bound as text and cast by the engine.
#[must_use]
pub fn row_value_to_duckdb_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::BigInt(*i),
        RowValues::Float(f) => Value::Double(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Boolean(*b),
        RowValues::Timestamp(dt) => Value::Text(format_timestamp(dt)),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

pub(crate) fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%F %T%.f").to_string()
}

/// Binds one value at a 1-based parameter index.
///
/// `SQL_TYPE` is the designation used when an `Option<Self>` is `None`.
pub trait BindParam {
    const SQL_TYPE: SqlType;

    /// Bind `self` at `index` on `stmt`.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::QueryError` if the index is out of range.
    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError>;
}

impl BindParam for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_int(index, self).map(|_| ())
    }
}

impl BindParam for i64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_long(index, self).map(|_| ())
    }
}

impl BindParam for f64 {
    const SQL_TYPE: SqlType = SqlType::Double;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_double(index, self).map(|_| ())
    }
}

impl BindParam for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_boolean(index, self).map(|_| ())
    }
}

impl BindParam for String {
    const SQL_TYPE: SqlType = SqlType::Varchar;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_string(index, self).map(|_| ())
    }
}

impl BindParam for &str {
    const SQL_TYPE: SqlType = SqlType::Varchar;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_string(index, self).map(|_| ())
    }
}

impl BindParam for NaiveDateTime {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_timestamp(index, self).map(|_| ())
    }
}

impl BindParam for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Blob;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_blob(index, self).map(|_| ())
    }
}

impl BindParam for RowValues {
    const SQL_TYPE: SqlType = SqlType::Null;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        stmt.set_value(index, &self)
    }
}

impl<T: BindParam> BindParam for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn bind_param(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
        index: usize,
    ) -> Result<(), DuckMiddlewareDbError> {
        match self {
            Some(value) => value.bind_param(stmt, index),
            None => stmt.set_null(index, T::SQL_TYPE),
        }
    }
}

/// A complete parameter list, bound from index 1 upwards.
pub trait BindParams {
    /// Number of values this list binds.
    fn param_count(&self) -> usize;

    /// Bind every value in order.
    ///
    /// # Errors
    /// Returns the first binding failure.
    fn bind_all(self, stmt: &mut DuckDbPreparedStatement<'_>)
    -> Result<(), DuckMiddlewareDbError>;
}

impl BindParams for () {
    fn param_count(&self) -> usize {
        0
    }

    fn bind_all(
        self,
        _stmt: &mut DuckDbPreparedStatement<'_>,
    ) -> Result<(), DuckMiddlewareDbError> {
        Ok(())
    }
}

impl BindParams for &[RowValues] {
    fn param_count(&self) -> usize {
        self.len()
    }

    fn bind_all(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
    ) -> Result<(), DuckMiddlewareDbError> {
        for (offset, value) in self.iter().enumerate() {
            stmt.set_value(offset + 1, value)?;
        }
        Ok(())
    }
}

impl BindParams for Vec<RowValues> {
    fn param_count(&self) -> usize {
        self.len()
    }

    fn bind_all(
        self,
        stmt: &mut DuckDbPreparedStatement<'_>,
    ) -> Result<(), DuckMiddlewareDbError> {
        self.as_slice().bind_all(stmt)
    }
}

macro_rules! impl_bind_params_tuple {
    ($count:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: BindParam),+> BindParams for ($($name,)+) {
            fn param_count(&self) -> usize {
                $count
            }

            fn bind_all(
                self,
                stmt: &mut DuckDbPreparedStatement<'_>,
            ) -> Result<(), DuckMiddlewareDbError> {
                $( self.$idx.bind_param(stmt, $idx + 1)?; )+
                Ok(())
            }
        }
    };
}

impl_bind_params_tuple!(1; A: 0);
impl_bind_params_tuple!(2; A: 0, B: 1);
impl_bind_params_tuple!(3; A: 0, B: 1, C: 2);
impl_bind_params_tuple!(4; A: 0, B: 1, C: 2, D: 3);
