use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    config::AppConfig,
    db::create_pool,
    error::{AppError, AppResult},
    services::cam_catalog::{FiscalCalendar, TowerCatalog},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub report_cache: Cache<String, Value>,
    pub cam_catalog: Arc<TowerCatalog>,
    pub fiscal_calendar: FiscalCalendar,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, sqlx::Error> {
        let db_pool = create_pool(&config)?;
        let report_cache = Cache::builder()
            .max_capacity(config.report_response_cache_max_entries)
            .time_to_live(Duration::from_secs(
                config.report_response_cache_ttl_seconds.max(1),
            ))
            .build();

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            report_cache,
            cam_catalog: Arc::new(TowerCatalog::standard()),
            fiscal_calendar: FiscalCalendar::standard(),
        })
    }

    pub fn db_pool(&self) -> AppResult<&PgPool> {
        self.db_pool.as_ref().ok_or_else(|| {
            AppError::Dependency(
                "Supabase database is not configured. Set SUPABASE_DB_URL or DATABASE_URL."
                    .to_string(),
            )
        })
    }

    /// Drop every cached report; called after any CAM write.
    pub fn invalidate_reports(&self) {
        self.report_cache.invalidate_all();
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let mut config = AppConfig::from_env();
    config.supabase_db_url = None;
    AppState::build(config).expect("state without database")
}
