mod cache;
mod classifier;
mod clock;
mod config;
mod db;
mod extraction;
mod import;
mod logging;
mod models;
mod plans;
mod progression;
mod rest;
mod routes;
mod session;
mod store;
mod summary;
mod workbook;

#[cfg(test)]
mod test_utils;

use clock::SystemClock;
use config::AppConfig;
use db::AppState;
use std::sync::Arc;
use store::SqliteStore;
use tracing::info;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let config = AppConfig::from_env()?;
  logging::init_tracing(&config.log_level);

  let pool = db::initialize_db(&config.database_url).await?;
  let bind_addr = config.bind_addr.clone();
  let state = AppState::new(Arc::new(SqliteStore::new(pool)), Arc::new(SystemClock), config);

  let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
  info!(%bind_addr, "Workout log server listening");

  axum::serve(listener, routes::router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "Failed to listen for shutdown signal");
  }
}
