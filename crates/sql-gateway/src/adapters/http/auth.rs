use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::{protocol::ErrorResponse, AppState};

/// Bearer-token gate: plain set membership over the configured token list.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match header.strip_prefix("Bearer ") {
        Some(token) if state.tokens.contains(token) => next.run(request).await,
        Some(token) => {
            // Log a short preview only, never the full token.
            tracing::warn!(
                token_preview = %preview(token),
                token_len = token.len(),
                "invalid token attempt"
            );
            unauthorized()
        }
        None => unauthorized(),
    }
}

fn unauthorized() -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Invalid authentication token")),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

fn preview(token: &str) -> String {
    token.chars().take(10).collect()
}
