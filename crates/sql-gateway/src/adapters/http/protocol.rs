use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::{ColumnInfo, DbRow};

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DbRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl QueryResponse {
    pub fn success(data: Vec<DbRow>, rows_count: usize, execution_time: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            rows_count: Some(rows_count),
            execution_time: Some(execution_time),
            error: None,
            timestamp: now(),
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            data: None,
            rows_count: None,
            execution_time: None,
            error: Some(error),
            timestamp: now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub success: bool,
    pub tables: Vec<String>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

impl TablesResponse {
    pub fn new(tables: Vec<String>) -> Self {
        let count = tables.len();
        Self {
            success: true,
            tables,
            count,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub success: bool,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub timestamp: DateTime<Utc>,
}

impl SchemaResponse {
    pub fn new(table: String, columns: Vec<ColumnInfo>) -> Self {
        Self {
            success: true,
            table,
            columns,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database_connected: bool,
    pub uptime_seconds: f64,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            timestamp: now(),
        }
    }
}
