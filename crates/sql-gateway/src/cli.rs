use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "sql-gateway")]
pub struct Args {
    /// Path to the SQLite database file.
    #[arg(long, env = "SQLITE_DB_PATH")]
    pub db_path: PathBuf,

    /// Port the HTTP listener binds to.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// API bearer tokens, comma separated.
    #[arg(long, env = "API_TOKENS", default_value = "default-token-change-me")]
    pub api_tokens: String,

    /// CORS allowed origins, comma separated. "*" allows any origin.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Deadline for a single query execution.
    #[arg(long, env = "QUERY_TIMEOUT_MS", default_value_t = 30_000)]
    pub query_timeout_ms: u64,

    /// Lifetime of cached result sets.
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// SQLite busy timeout per connection.
    #[arg(long, default_value_t = 2_000)]
    pub busy_timeout_ms: u64,

    /// Logging level (stderr). Also supports RUST_LOG.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn tokens(&self) -> HashSet<String> {
        self.api_tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
