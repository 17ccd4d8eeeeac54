use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::{Statement, params_from_iter};

use crate::types::RowValues;

/// Convert a driver `Value` into `RowValues`.
///
/// DECIMAL, DATE, TIME and INTERVAL have no dedicated variant and come back as
/// text in the engine's own rendering. Nested types fall back to debug text.
#[must_use]
pub fn duckdb_value_to_row_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Boolean(b) => RowValues::Bool(b),
        Value::TinyInt(i) => RowValues::Int(i64::from(i)),
        Value::SmallInt(i) => RowValues::Int(i64::from(i)),
        Value::Int(i) => RowValues::Int(i64::from(i)),
        Value::BigInt(i) => RowValues::Int(i),
        Value::UTinyInt(i) => RowValues::Int(i64::from(i)),
        Value::USmallInt(i) => RowValues::Int(i64::from(i)),
        Value::UInt(i) => RowValues::Int(i64::from(i)),
        Value::UBigInt(i) => {
            i64::try_from(i).map_or_else(|_| RowValues::Text(i.to_string()), RowValues::Int)
        }
        Value::HugeInt(i) => {
            i64::try_from(i).map_or_else(|_| RowValues::Text(i.to_string()), RowValues::Int)
        }
        Value::Float(f) => RowValues::Float(f64::from(f)),
        Value::Double(f) => RowValues::Float(f),
        Value::Decimal(d) => RowValues::Text(d.to_string()),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
        Value::Timestamp(unit, raw) => timestamp_from_unit(unit, raw)
            .map_or_else(|| RowValues::Int(raw), RowValues::Timestamp),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(i64::from(days))))
            .map_or_else(
                || RowValues::Int(i64::from(days)),
                |date| RowValues::Text(date.format("%Y-%m-%d").to_string()),
            ),
        Value::Time64(unit, raw) => time_from_unit(unit, raw).map_or_else(
            || RowValues::Int(raw),
            |time| RowValues::Text(time.format("%H:%M:%S%.f").to_string()),
        ),
        Value::Interval {
            months,
            days,
            nanos,
        } => RowValues::Text(format_interval(months, days, nanos)),
        Value::Enum(s) => RowValues::Text(s),
        other => RowValues::Text(format!("{other:?}")),
    }
}

fn nanos_per(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

fn timestamp_from_unit(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let utc = match unit {
        TimeUnit::Second => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    };
    utc.map(|dt| dt.naive_utc())
}

fn time_from_unit(unit: TimeUnit, raw: i64) -> Option<NaiveTime> {
    let nanos = raw.checked_mul(nanos_per(unit))?;
    let secs = u32::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
}

/// Renders like the engine does: `1 year 2 months 3 days 04:05:06.5`.
fn format_interval(months: i32, days: i32, nanos: i64) -> String {
    fn unit(n: i64, singular: &str) -> String {
        if n.abs() == 1 {
            format!("{n} {singular}")
        } else {
            format!("{n} {singular}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(unit(i64::from(years), "year"));
    }
    if months != 0 {
        parts.push(unit(i64::from(months), "month"));
    }
    if days != 0 {
        parts.push(unit(i64::from(days), "day"));
    }
    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let total = nanos.unsigned_abs();
        let secs = total / 1_000_000_000;
        let micros = (total % 1_000_000_000) / 1_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if micros != 0 {
            let frac = format!("{micros:06}");
            clock.push('.');
            clock.push_str(frac.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// Run a prepared query and materialise its rows.
///
/// Column names are read after execution, when the driver knows the result
/// schema.
///
/// # Errors
/// Returns the driver error if execution or value extraction fails.
pub(crate) fn build_rows(
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<(Arc<Vec<String>>, Vec<Vec<RowValues>>), duckdb::Error> {
    let mut rows_iter = stmt.query(params_from_iter(params.iter()))?;
    let column_names: Vec<String> = rows_iter
        .as_ref()
        .map(|s| s.column_names().into_iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let width = column_names.len();

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(width);
        for i in 0..width {
            let value: Value = row.get(i)?;
            row_values.push(duckdb_value_to_row_value(value));
        }
        rows.push(row_values);
    }

    Ok((Arc::new(column_names), rows))
}
