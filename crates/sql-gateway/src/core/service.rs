use std::sync::Arc;
use std::time::Instant;

use crate::core::cache::{fingerprint, QueryCache};
use crate::core::executor::QueryExecutor;
use crate::core::policy::{self, Verdict};
use crate::core::types::{QueryOutcome, QueryRequest};

/// Composes validator, cache and executor. This is the only entry point the
/// HTTP layer calls for query execution; it never returns an error, only
/// structured outcomes.
pub struct QueryService {
    executor: Arc<dyn QueryExecutor>,
    cache: Arc<QueryCache>,
}

impl QueryService {
    pub fn new(executor: Arc<dyn QueryExecutor>, cache: Arc<QueryCache>) -> Self {
        Self { executor, cache }
    }

    pub async fn run(&self, request: &QueryRequest) -> QueryOutcome {
        let started = Instant::now();
        let query = request.query.trim();

        if let Verdict::Rejected { reason } = policy::validate(query) {
            tracing::warn!(%reason, "SQL validation failed");
            return QueryOutcome::Failure {
                error: format!("SQL validation failed: {reason}"),
            };
        }

        let params = request.params.as_deref().unwrap_or(&[]);
        let key = fingerprint(query, params);

        if let Some(hit) = self.cache.lookup(key) {
            tracing::debug!(key = ?key, rows = hit.row_count, "cache hit");
            return QueryOutcome::Success {
                rows: hit.rows,
                row_count: hit.row_count,
                elapsed: started.elapsed().as_secs_f64(),
            };
        }

        match self.executor.execute(query, params).await {
            Ok(set) => {
                self.cache.store(key, set.clone());
                let elapsed = started.elapsed().as_secs_f64();
                tracing::info!(rows = set.row_count, elapsed, "query executed");
                QueryOutcome::Success {
                    rows: set.rows,
                    row_count: set.row_count,
                    elapsed,
                }
            }
            Err(crate::error::AppError::InvalidRequest(detail)) => {
                tracing::warn!(%detail, "invalid request");
                QueryOutcome::Failure {
                    error: format!("Invalid request: {detail}"),
                }
            }
            Err(e) if e.is_database_fault() => {
                tracing::error!(code = e.code(), error = %e, "database error");
                QueryOutcome::Failure {
                    error: format!("Database error: {e}"),
                }
            }
            Err(e) => {
                // Detail stays server-side; the caller gets a generic string.
                tracing::error!(code = e.code(), error = %e, "unexpected error");
                QueryOutcome::Failure {
                    error: "Internal error".to_string(),
                }
            }
        }
    }

    /// Empty the result cache, returning the number of removed entries.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}
