use crate::{auth::LoginLimiter, cache::ResponseCache, config::Config, db::Database};
use std::sync::Arc;

// ============================================================================
// APPLICATION STATE - Shared data across all requests
// ============================================================================
/// Cloned into every handler; all fields are cheap `Arc` handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub index_cache: ResponseCache,
    pub login_limiter: Arc<LoginLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_database(config, Database::new())
    }

    pub fn with_database(config: Config, db: Database) -> Self {
        Self {
            db: Arc::new(db),
            index_cache: ResponseCache::new(config.index_cache_ttl, config.index_cache_max_entries),
            login_limiter: Arc::new(LoginLimiter::per_minute(config.login_attempts_per_minute)),
            config: Arc::new(config),
        }
    }
}
