//! Test utilities and helpers for unit and route testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - A controllable clock
//! - Mock data factories

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::AppState;
use crate::models::{PlanRecord, TrainingSetLog};
use crate::store::MemoryStore;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// App state over an empty in-memory store with default config
pub fn memory_state(clock: Arc<ManualClock>) -> AppState {
  memory_state_with_config(clock, AppConfig::default())
}

/// App state over an empty in-memory store with the given config
pub fn memory_state_with_config(clock: Arc<ManualClock>, config: AppConfig) -> AppState {
  AppState::new(Arc::new(MemoryStore::new()), clock, config)
}

/// Replace the plan table of `state` with `records`
pub async fn seed_plans(state: &AppState, records: &[PlanRecord]) {
  state
    .plans
    .replace_all(records)
    .await
    .expect("Failed to seed plans");
}

/// ---------------------------------------------------------------------------
/// Clock
/// ---------------------------------------------------------------------------

/// Clock that only moves when told to; starts at 2026-03-01T08:00:00Z
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self {
      now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()),
    }
  }
}

impl ManualClock {
  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap();
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}

/// The date a fresh [`ManualClock`] reports
pub fn test_today() -> NaiveDate {
  NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Two-exercise plan: 深蹲 3x12 resting 90s, 硬拉 3x10 resting 120s
pub fn mock_plan_record(date: NaiveDate) -> PlanRecord {
  PlanRecord {
    date,
    phase: Some("测试阶段".to_string()),
    headers: ["动作", "组数", "次数", "休息"].map(String::from).to_vec(),
    remarks: vec!["注意动作控制".to_string()],
    plan_data: vec![
      ["深蹲", "3", "12", "90秒"].map(String::from).to_vec(),
      ["硬拉", "3", "10", "120秒"].map(String::from).to_vec(),
    ],
  }
}

/// A logged set with only the progression-relevant fields filled in
pub fn mock_set_log(exercise: &str, set_number: u32) -> TrainingSetLog {
  TrainingSetLog {
    id: format!("log-{}-{}", exercise, set_number),
    session_id: "session-1".to_string(),
    exercise: exercise.to_string(),
    set_number,
    actual_reps: None,
    actual_weight: None,
    rpe: None,
    rest_seconds: None,
    notes: None,
    completed_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('workout_plans', 'training_sessions', 'training_sets')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_manual_clock_advances() {
    let clock = ManualClock::default();
    assert_eq!(clock.today(), test_today());

    clock.advance(Duration::hours(20));

    assert_eq!(clock.today(), test_today() + Duration::days(1));
  }

  #[test]
  fn test_mock_plan_record_is_aligned() {
    let record = mock_plan_record(test_today());
    assert!(record.has_rows());
    assert!(record.plan_data.iter().all(|row| row.len() == record.headers.len()));
  }
}
