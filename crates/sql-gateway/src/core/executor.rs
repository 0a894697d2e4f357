use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags};

use crate::core::materialize;
use crate::core::schema;
use crate::core::types::{ColumnInfo, ColumnMeta, ResultSet};
use crate::error::{AppError, AppResult};

/// Seam between the orchestrator and the physical database, so tests can
/// substitute a counting double.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[serde_json::Value]) -> AppResult<ResultSet>;
}

/// Runs validated queries against a SQLite database.
///
/// One fresh read-only connection per call, released on every exit path via
/// drop. A single execution attempt per call; retry policy, if any, belongs
/// to the caller. The query deadline is enforced with a progress handler
/// that interrupts the statement once the deadline passes.
#[derive(Debug, Clone)]
pub struct DbExecutor {
    db_path: PathBuf,
    busy_timeout: Duration,
    query_timeout: Duration,
}

impl DbExecutor {
    pub fn new(db_path: PathBuf, busy_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            db_path,
            busy_timeout,
            query_timeout,
        }
    }

    /// Connectivity probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        let this = self.clone();
        let res = tokio::task::spawn_blocking(move || -> AppResult<i64> {
            let conn = this.open()?;
            Ok(conn.query_row("SELECT 1", [], |r| r.get(0))?)
        })
        .await;
        matches!(res, Ok(Ok(1)))
    }

    pub async fn list_tables(&self) -> AppResult<Vec<String>> {
        let this = self.clone();
        run_blocking(move || {
            let conn = this.open()?;
            schema::list_tables(&conn)
        })
        .await
    }

    /// Resolve `table` case-insensitively against the user table list and
    /// return its column descriptions. Unknown names fail with
    /// `TableNotFound`.
    pub async fn table_schema(&self, table: &str) -> AppResult<(String, Vec<ColumnInfo>)> {
        let this = self.clone();
        let table = table.to_string();
        run_blocking(move || {
            let conn = this.open()?;
            schema::table_schema(&conn, &table)
        })
        .await
    }

    fn open(&self) -> AppResult<Connection> {
        open_readonly(&self.db_path, self.busy_timeout)
    }
}

#[async_trait]
impl QueryExecutor for DbExecutor {
    async fn execute(&self, sql: &str, params: &[serde_json::Value]) -> AppResult<ResultSet> {
        let this = self.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        run_blocking(move || {
            let started = Instant::now();
            let conn = this.open()?;
            install_deadline(&conn, started + this.query_timeout);
            let res = run_query(&conn, &sql, &params);
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = res.is_ok(),
                "query finished"
            );
            res
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

fn open_readonly(path: &Path, busy_timeout: Duration) -> AppResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(|source| AppError::DbOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let _ = conn.busy_timeout(busy_timeout);
    Ok(conn)
}

fn install_deadline(conn: &Connection, deadline: Instant) {
    // Checked every 1000 VM ops; returning true interrupts the statement,
    // which surfaces as SQLITE_INTERRUPT.
    conn.progress_handler(1000, Some(move || Instant::now() >= deadline));
}

fn run_query(conn: &Connection, sql: &str, params: &[serde_json::Value]) -> AppResult<ResultSet> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_err)?;

    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .map(|c| ColumnMeta {
            name: c.name().to_string(),
            decl_type: c.decl_type().map(str::to_string),
        })
        .collect();
    let column_count = columns.len();

    for (i, p) in params.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, bind_value(p)?)
            .map_err(map_sql_err)?;
    }

    let mut raw_rows: Vec<Vec<SqlValue>> = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next().map_err(map_sql_err)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(owned_value(row.get_ref(i).map_err(map_sql_err)?));
        }
        raw_rows.push(values);
    }

    Ok(materialize::materialize(&columns, raw_rows))
}

/// Only JSON scalars bind; arrays and objects are an invalid request.
fn bind_value(v: &serde_json::Value) -> AppResult<SqlValue> {
    use serde_json::Value;
    match v {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(AppError::InvalidRequest(format!(
                    "unsupported numeric parameter: {n}"
                )))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(AppError::InvalidRequest(
            "query parameters must be scalar values".into(),
        )),
    }
}

fn owned_value(v: ValueRef<'_>) -> SqlValue {
    match v {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(x) => SqlValue::Integer(x),
        ValueRef::Real(x) => SqlValue::Real(x),
        // Lossy decode so malformed bytes never abort a result set.
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

fn map_sql_err(e: rusqlite::Error) -> AppError {
    if matches!(
        e,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::OperationInterrupted,
                ..
            },
            _,
        )
    ) {
        return AppError::Timeout;
    }
    AppError::SqlError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE storgrp (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 price DECIMAL(10,2),
                 created_at TIMESTAMP
             );
             INSERT INTO storgrp VALUES (1, 'Shop 1', '10.50', 0);
             INSERT INTO storgrp VALUES (2, 'Shop 2', NULL, NULL);",
        )
        .unwrap();
        path
    }

    fn executor(path: PathBuf) -> DbExecutor {
        DbExecutor::new(path, Duration::from_millis(500), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn executes_select_and_materializes() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        let set = ex.execute("SELECT * FROM storgrp ORDER BY id", &[]).await.unwrap();
        assert_eq!(set.row_count, 2);
        assert_eq!(set.rows[0]["name"], "Shop 1");
        assert_eq!(set.rows[0]["price"], 10.5);
        assert_eq!(set.rows[0]["created_at"], "1970-01-01T00:00:00Z");
        assert!(set.rows[1]["price"].is_null());
    }

    #[tokio::test]
    async fn binds_positional_params() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        let set = ex
            .execute("SELECT name FROM storgrp WHERE id = ?", &[json!(2)])
            .await
            .unwrap();
        assert_eq!(set.row_count, 1);
        assert_eq!(set.rows[0]["name"], "Shop 2");
    }

    #[tokio::test]
    async fn unknown_table_is_sql_error() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        let err = ex.execute("SELECT * FROM missing", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::SqlError(_)), "{err:?}");
    }

    #[tokio::test]
    async fn non_scalar_param_is_invalid_request() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        let err = ex
            .execute("SELECT ?", &[json!([1, 2])])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)), "{err:?}");
    }

    #[tokio::test]
    async fn runaway_query_surfaces_timeout() {
        let dir = TempDir::new().unwrap();
        let ex = DbExecutor::new(
            seeded_db(&dir),
            Duration::from_millis(500),
            Duration::from_millis(200),
        );
        let err = ex
            .execute(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
                 SELECT count(*) FROM c",
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn missing_database_is_open_failure() {
        let ex = executor(PathBuf::from("/nonexistent/nope.db"));
        let err = ex.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::DbOpenFailed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn connection_is_readonly() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        // The executor only runs validated text, but a second line of
        // defense: the connection itself refuses writes.
        let err = ex.execute("DELETE FROM storgrp", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::SqlError(_)), "{err:?}");
    }

    #[tokio::test]
    async fn ping_reflects_reachability() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        assert!(ex.ping().await);
        let bad = executor(PathBuf::from("/nonexistent/nope.db"));
        assert!(!bad.ping().await);
    }

    #[tokio::test]
    async fn lists_tables_and_reads_schema() {
        let dir = TempDir::new().unwrap();
        let ex = executor(seeded_db(&dir));
        assert_eq!(ex.list_tables().await.unwrap(), vec!["storgrp"]);

        let (name, cols) = ex.table_schema("STORGRP").await.unwrap();
        assert_eq!(name, "storgrp");
        assert_eq!(cols[0].name, "id");
        assert!(!cols[1].nullable, "name is declared NOT NULL");
        assert!(cols[3].nullable);

        let err = ex.table_schema("missing").await.unwrap_err();
        assert!(matches!(err, AppError::TableNotFound(_)), "{err:?}");
    }
}
