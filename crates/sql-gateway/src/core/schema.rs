use rusqlite::{Connection, Row};

use crate::core::types::ColumnInfo;
use crate::error::{AppError, AppResult};

/// User-defined tables only: system catalog entries and views are excluded,
/// in name order.
pub fn list_tables(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Resolve `table` case-insensitively against the user table list, then
/// describe its columns in declaration order. Returns the resolved (stored)
/// table name alongside the columns.
pub fn table_schema(conn: &Connection, table: &str) -> AppResult<(String, Vec<ColumnInfo>)> {
    let tables = list_tables(conn)?;
    let Some(resolved) = tables.into_iter().find(|t| t.eq_ignore_ascii_case(table)) else {
        return Err(AppError::TableNotFound(table.to_string()));
    };

    let columns = list_columns(conn, &resolved)?;
    Ok((resolved, columns))
}

fn list_columns(conn: &Connection, table: &str) -> AppResult<Vec<ColumnInfo>> {
    // PRAGMA table_info does not take bind parameters, so the name must be
    // validated as an identifier to prevent injection. Names resolved from
    // sqlite_master normally pass; exotic quoted names are rejected.
    if !is_safe_identifier(table) {
        return Err(AppError::InvalidRequest(format!(
            "invalid table identifier: {table}"
        )));
    }

    let sql = format!("PRAGMA table_info({table})");
    let mut stmt = conn.prepare(&sql)?;
    let cols = stmt
        .query_map([], |row: &Row<'_>| {
            let name: String = row.get("name")?;
            let data_type: String = row.get("type")?;
            let notnull: i64 = row.get("notnull")?;
            Ok(ColumnInfo {
                name,
                data_type: if data_type.is_empty() {
                    "UNKNOWN".to_string()
                } else {
                    data_type
                },
                nullable: notnull == 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols)
}

pub(crate) fn is_safe_identifier(s: &str) -> bool {
    // Minimal safe subset: [A-Za-z_][A-Za-z0-9_]*
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
