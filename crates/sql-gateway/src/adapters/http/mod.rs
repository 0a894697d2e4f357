use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cli::Args;
use crate::core::cache::QueryCache;
use crate::core::executor::DbExecutor;
use crate::core::service::QueryService;
use crate::error::AppResult;

mod auth;
mod protocol;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
    pub executor: Arc<DbExecutor>,
    pub tokens: Arc<HashSet<String>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn from_args(args: &Args) -> Self {
        let executor = Arc::new(DbExecutor::new(
            args.db_path.clone(),
            Duration::from_millis(args.busy_timeout_ms),
            Duration::from_millis(args.query_timeout_ms),
        ));
        let cache = Arc::new(QueryCache::new(Duration::from_secs(args.cache_ttl_secs)));
        let service = Arc::new(QueryService::new(executor.clone(), cache));
        Self {
            service,
            executor,
            tokens: Arc::new(args.tokens()),
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let protected = Router::new()
        .route("/api/query", post(routes::execute_query))
        .route("/api/tables", get(routes::list_tables))
        .route("/api/schema/:table", get(routes::table_schema))
        .route("/api/cache/clear", post(routes::clear_cache))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .merge(protected)
        .route("/api/health", get(routes::health))
        .route("/api/", get(routes::root))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

pub async fn run(args: Args) -> AppResult<()> {
    let state = AppState::from_args(&args);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        db_path = %args.db_path.display(),
        port = args.port,
        "starting sql-gateway"
    );
    if state.executor.ping().await {
        tracing::info!("database connection test: ok");
    } else {
        tracing::warn!("database unreachable; queries will fail until it comes back");
    }

    let app = router(state, cors_layer(&args.origins()));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(port = args.port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
