use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::core::types::{QueryOutcome, QueryRequest};
use crate::error::AppError;

use super::protocol::{
    ErrorResponse, HealthResponse, MessageResponse, QueryResponse, SchemaResponse, TablesResponse,
};
use super::AppState;

/// POST /api/query. Both validation failures and database failures come
/// back as HTTP 200 with `success=false`; only transport concerns use
/// other status codes.
pub async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    match state.service.run(&request).await {
        QueryOutcome::Success {
            rows,
            row_count,
            elapsed,
        } => Json(QueryResponse::success(rows, row_count, elapsed)),
        QueryOutcome::Failure { error } => Json(QueryResponse::failure(error)),
    }
}

/// GET /api/tables.
pub async fn list_tables(State(state): State<AppState>) -> Response {
    match state.executor.list_tables().await {
        Ok(tables) => {
            tracing::info!(count = tables.len(), "tables list retrieved");
            Json(TablesResponse::new(tables)).into_response()
        }
        Err(e) => database_error(e),
    }
}

/// GET /api/schema/{table}. Table name matching is case-insensitive; an
/// unknown name is a 404.
pub async fn table_schema(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Response {
    match state.executor.table_schema(&table).await {
        Ok((resolved, columns)) => {
            tracing::info!(table = %resolved, columns = columns.len(), "schema retrieved");
            Json(SchemaResponse::new(resolved, columns)).into_response()
        }
        Err(AppError::TableNotFound(name)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Table '{name}' not found"))),
        )
            .into_response(),
        Err(e) => database_error(e),
    }
}

/// GET /api/health. No auth; 200 when the database answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let database_connected = state.executor.ping().await;
    let uptime_seconds = state.started_at.elapsed().as_secs_f64();
    let body = HealthResponse {
        status: if database_connected {
            "healthy"
        } else {
            "unhealthy"
        },
        database_connected,
        uptime_seconds,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    };

    let status = if database_connected {
        StatusCode::OK
    } else {
        tracing::warn!("health check: database disconnected");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// POST /api/cache/clear. The removed count goes to the logs only.
pub async fn clear_cache(State(state): State<AppState>) -> Json<MessageResponse> {
    let removed = state.service.clear_cache();
    tracing::info!(removed, "query cache cleared");
    Json(MessageResponse::new("Cache cleared successfully"))
}

/// GET /api/.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "SQL Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/api/health"
    }))
}

fn database_error(e: AppError) -> Response {
    tracing::error!(code = e.code(), error = %e, "request failed");
    let message = if e.is_database_fault() {
        format!("Database error: {e}")
    } else {
        "Internal error".to_string()
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
        .into_response()
}
