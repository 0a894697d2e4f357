use chrono::{DateTime, SecondsFormat};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::core::types::{ColumnMeta, DbRow, ResultSet};

/// Convert raw driver rows into a JSON-safe result set.
///
/// Coercion is driven by the column's declared type, since SQLite itself
/// only distinguishes integer/real/text/blob/null:
/// - temporal columns holding an integer become ISO-8601 strings
///   (the integer is read as unix seconds); temporal text passes through,
/// - DECIMAL/NUMERIC columns holding text are parsed to f64, accepting the
///   precision loss,
/// - blobs decode as lossy UTF-8 and never error,
/// - everything else passes through unchanged.
///
/// An empty column list yields an empty result set, not an error.
pub fn materialize(columns: &[ColumnMeta], raw_rows: Vec<Vec<SqlValue>>) -> ResultSet {
    if columns.is_empty() {
        return ResultSet::default();
    }

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let mut row = DbRow::new();
        for (col, value) in columns.iter().zip(raw) {
            row.insert(col.name.clone(), coerce(col.decl_type.as_deref(), value));
        }
        rows.push(row);
    }
    ResultSet::new(rows)
}

fn coerce(decl_type: Option<&str>, value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(x) => {
            if is_temporal(decl_type) {
                match DateTime::from_timestamp(x, 0) {
                    Some(ts) => Value::from(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    None => Value::from(x),
                }
            } else {
                Value::from(x)
            }
        }
        SqlValue::Real(x) => Value::from(x),
        SqlValue::Text(s) => {
            if is_decimal(decl_type) {
                match s.trim().parse::<f64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::from(s),
                }
            } else {
                Value::from(s)
            }
        }
        SqlValue::Blob(b) => Value::from(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn is_temporal(decl_type: Option<&str>) -> bool {
    let Some(t) = decl_type else { return false };
    let t = t.to_ascii_uppercase();
    t.contains("DATE") || t.contains("TIME")
}

fn is_decimal(decl_type: Option<&str>) -> bool {
    let Some(t) = decl_type else { return false };
    let t = t.to_ascii_uppercase();
    t.contains("DECIMAL") || t.contains("NUMERIC")
}
