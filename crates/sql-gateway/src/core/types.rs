use serde::{Deserialize, Serialize};

/// Hard cap on inbound query text length, in characters.
pub const MAX_QUERY_LEN: usize = 10_000;

/// One materialized row: column name to JSON-safe scalar, in the order the
/// driver reported the columns (serde_json is built with `preserve_order`).
pub type DbRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(default)]
    pub decl_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<DbRow>,
    pub row_count: usize,
}

impl ResultSet {
    pub fn new(rows: Vec<DbRow>) -> Self {
        let row_count = rows.len();
        Self { rows, row_count }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
}

/// Outcome of one orchestrated query run. Failures here are ordinary data,
/// not errors: the HTTP layer renders both arms as a 200 envelope.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Success {
        rows: Vec<DbRow>,
        row_count: usize,
        elapsed: f64,
    },
    Failure {
        error: String,
    },
}
