use chrono::Duration;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use tracing::info;

use crate::cache::PlanCache;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::plans::PlanRepository;
use crate::session::TrainingSessionService;
use crate::store::RowStore;

pub type DbPool = SqlitePool;

/// Ten years
const MAX_CACHE_TTL_SECONDS: u64 = 315_360_000;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
  pub clock: Arc<dyn Clock>,
  pub plans: PlanRepository,
  pub sessions: TrainingSessionService,
  pub config: Arc<AppConfig>,
}

impl AppState {
  pub fn new(store: Arc<dyn RowStore>, clock: Arc<dyn Clock>, config: AppConfig) -> Self {
    let ttl = Duration::seconds(config.plan_cache_ttl_seconds.min(MAX_CACHE_TTL_SECONDS) as i64);
    let cache = Arc::new(PlanCache::new(ttl, clock.clone()));

    Self {
      plans: PlanRepository::new(store.clone(), cache),
      sessions: TrainingSessionService::new(store, clock.clone()),
      clock,
      config: Arc::new(config),
    }
  }
}

/// Open the connection pool and run migrations
pub async fn initialize_db(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
  info!(database_url, "Initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");
  Ok(pool)
}
