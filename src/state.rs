use crate::cache::Cache;
use crate::config::Config;
use crate::services::calendar::CalendarApi;
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

/// All shared handles are constructed in `main` and injected here; nothing
/// in the crate reaches for process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: Cache,
    pub calendar: Arc<dyn CalendarApi>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Cache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for Arc<dyn CalendarApi> {
    fn from_ref(state: &AppState) -> Self {
        state.calendar.clone()
    }
}
