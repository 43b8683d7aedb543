//! Training Session Service
//!
//! Owns the session lifecycle (`active` → `completed`) and its set logs on
//! top of a [`RowStore`]. At most one active session per plan date is kept
//! by query-then-insert; two racing starts can still both insert.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::session::SessionRecord;
use crate::models::{timestamp, NewSetLog, SessionStatus, TrainingSession, TrainingSetLog};
use crate::store::{from_row, to_row, Query, Row, RowStore, StoreError, Table};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("Storage error: {0}")]
  Store(#[from] StoreError),

  #[error("Session not found: {0}")]
  NotFound(String),

  #[error("Exercise name is required")]
  MissingExercise,
}

#[derive(Clone)]
pub struct TrainingSessionService {
  store: Arc<dyn RowStore>,
  clock: Arc<dyn Clock>,
}

impl TrainingSessionService {
  pub fn new(store: Arc<dyn RowStore>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  // ---------------------------------------------------------------------------
  /// Sessions
  // ---------------------------------------------------------------------------

  /// Resume the active session for `plan_date`, or open a new one
  pub async fn start_session(
    &self,
    plan_date: NaiveDate,
    rest_interval_seconds: u32,
  ) -> Result<TrainingSession, SessionError> {
    if let Some(session) = self.get_active_session(plan_date).await? {
      info!(session_id = %session.id, %plan_date, "Resuming active training session");
      return Ok(session);
    }

    let record = SessionRecord {
      id: Uuid::new_v4().to_string(),
      plan_date,
      status: SessionStatus::Active,
      rest_interval_seconds,
      started_at: self.clock.now(),
      completed_at: None,
      notes: None,
      metadata: None,
    };
    self.store.insert(Table::TrainingSessions, vec![to_row(&record)?]).await?;

    info!(session_id = %record.id, %plan_date, "Created training session");
    Ok(record.into_session(Vec::new()))
  }

  /// Mark a session completed. Already completed sessions keep their
  /// completion time; `notes` are only written when given.
  pub async fn complete_session(
    &self,
    session_id: &str,
    notes: Option<String>,
  ) -> Result<TrainingSession, SessionError> {
    let record = self
      .find_record(session_id)
      .await?
      .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

    let mut patch = Row::new();
    if record.status != SessionStatus::Completed || record.completed_at.is_none() {
      patch.insert("status".into(), json!(SessionStatus::Completed.as_str()));
      patch.insert("completed_at".into(), json!(timestamp::format(&self.clock.now())));
    }
    if let Some(notes) = notes {
      patch.insert("notes".into(), Value::String(notes));
    }

    let record = if patch.is_empty() {
      record
    } else {
      let updated = self
        .store
        .update(Table::TrainingSessions, patch, &Query::all().filter_eq("id", session_id))
        .await?;
      let row = updated
        .into_iter()
        .next()
        .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
      from_row::<SessionRecord>(row)?
    };

    info!(session_id, "Training session completed");
    let logs = self.fetch_logs(session_id).await?;
    Ok(record.into_session(logs))
  }

  async fn find_record(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
    let rows = self
      .store
      .select(Table::TrainingSessions, &Query::all().filter_eq("id", session_id).limit(1))
      .await?;
    rows
      .into_iter()
      .next()
      .map(from_row::<SessionRecord>)
      .transpose()
      .map_err(SessionError::from)
  }

  pub async fn get_session(&self, session_id: &str) -> Result<Option<TrainingSession>, SessionError> {
    match self.find_record(session_id).await? {
      Some(record) => {
        let logs = self.fetch_logs(session_id).await?;
        Ok(Some(record.into_session(logs)))
      }
      None => Ok(None),
    }
  }

  /// Most recently started active session for the date
  pub async fn get_active_session(&self, plan_date: NaiveDate) -> Result<Option<TrainingSession>, SessionError> {
    let query = Query::all()
      .filter_eq("plan_date", plan_date.to_string())
      .filter_eq("status", SessionStatus::Active.as_str())
      .order_by("started_at", true)
      .limit(1);
    let rows = self.store.select(Table::TrainingSessions, &query).await?;

    let Some(row) = rows.into_iter().next() else {
      return Ok(None);
    };
    let record: SessionRecord = from_row(row)?;
    let logs = self.fetch_logs(&record.id).await?;
    Ok(Some(record.into_session(logs)))
  }

  // ---------------------------------------------------------------------------
  /// Set logs
  // ---------------------------------------------------------------------------

  /// Append a set log; `set_number` defaults to the next one for the exercise
  pub async fn record_set(&self, new_log: NewSetLog) -> Result<TrainingSetLog, SessionError> {
    let exercise = new_log.exercise.trim();
    if exercise.is_empty() {
      return Err(SessionError::MissingExercise);
    }

    let set_number = match new_log.set_number {
      Some(n) => n,
      None => self.next_set_number(&new_log.session_id, exercise).await?,
    };

    let log = TrainingSetLog {
      id: Uuid::new_v4().to_string(),
      session_id: new_log.session_id.clone(),
      exercise: exercise.to_string(),
      set_number,
      actual_reps: new_log.actual_reps,
      actual_weight: new_log.actual_weight,
      rpe: new_log.rpe,
      rest_seconds: new_log.rest_seconds,
      notes: new_log.notes,
      completed_at: self.clock.now(),
    };
    self.store.insert(Table::TrainingSets, vec![to_row(&log)?]).await?;

    info!(
      session_id = %log.session_id,
      exercise = %log.exercise,
      set_number,
      "Logged training set"
    );
    Ok(log)
  }

  /// Logs of one session, most recent first
  async fn fetch_logs(&self, session_id: &str) -> Result<Vec<TrainingSetLog>, SessionError> {
    let query = Query::all()
      .filter_eq("session_id", session_id)
      .order_by("completed_at", true)
      .order_by("set_number", true);
    let rows = self.store.select(Table::TrainingSets, &query).await?;
    Ok(rows.into_iter().map(from_row::<TrainingSetLog>).collect::<Result<Vec<_>, _>>()?)
  }

  async fn next_set_number(&self, session_id: &str, exercise: &str) -> Result<u32, SessionError> {
    let query = Query::all()
      .filter_eq("session_id", session_id)
      .filter_eq("exercise", exercise)
      .order_by("set_number", true)
      .limit(1);
    let rows = self.store.select(Table::TrainingSets, &query).await?;

    let last = rows.first().and_then(|row| row.get("set_number"));
    match last {
      None => Ok(1),
      Some(value) => match value.as_u64() {
        Some(n) => Ok(n as u32 + 1),
        None => {
          warn!(%value, "Invalid stored set number, restarting at 1");
          Ok(1)
        }
      },
    }
  }

  // ---------------------------------------------------------------------------
  /// History
  // ---------------------------------------------------------------------------

  /// Latest logs across all sessions, most recent first
  pub async fn list_recent_history(&self, limit: usize) -> Result<Vec<TrainingSetLog>, SessionError> {
    let query = Query::all()
      .order_by("completed_at", true)
      .order_by("set_number", true)
      .limit(limit);
    let rows = self.store.select(Table::TrainingSets, &query).await?;
    Ok(rows.into_iter().map(from_row::<TrainingSetLog>).collect::<Result<Vec<_>, _>>()?)
  }

  /// Sessions by id, without their logs
  pub async fn fetch_sessions_map(
    &self,
    session_ids: &[String],
  ) -> Result<HashMap<String, TrainingSession>, SessionError> {
    if session_ids.is_empty() {
      return Ok(HashMap::new());
    }

    let mut unique = session_ids.to_vec();
    unique.sort();
    unique.dedup();

    let rows = self
      .store
      .select(Table::TrainingSessions, &Query::all().filter_in("id", unique))
      .await?;
    rows
      .into_iter()
      .map(|row| -> Result<_, SessionError> {
        let record: SessionRecord = from_row(row)?;
        Ok((record.id.clone(), record.into_session(Vec::new())))
      })
      .collect()
  }

  /// Wall-clock end of a rest; advisory only
  pub fn rest_finishes_at(&self, seconds: u32) -> DateTime<Utc> {
    self.clock.now() + Duration::seconds(i64::from(seconds))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, SqliteStore};
  use crate::test_utils::{setup_test_db, teardown_test_db, ManualClock};

  fn service() -> (TrainingSessionService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let service = TrainingSessionService::new(Arc::new(MemoryStore::new()), clock.clone());
    (service, clock)
  }

  fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
  }

  fn new_log(session_id: &str, exercise: &str) -> NewSetLog {
    NewSetLog {
      session_id: session_id.to_string(),
      exercise: exercise.to_string(),
      actual_reps: Some(12),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_start_session_resumes_active() {
    // Arrange
    let (service, _clock) = service();

    // Act
    let first = service.start_session(date(), 90).await.unwrap();
    let second = service.start_session(date(), 60).await.unwrap();

    // Assert
    assert_eq!(first.id, second.id);
    assert_eq!(second.rest_interval_seconds, 90);
    assert!(second.is_active());
  }

  #[tokio::test]
  async fn test_new_session_after_completion() {
    let (service, _clock) = service();
    let first = service.start_session(date(), 90).await.unwrap();
    service.complete_session(&first.id, None).await.unwrap();

    let second = service.start_session(date(), 90).await.unwrap();

    assert_ne!(first.id, second.id);
    assert!(second.is_active());
  }

  #[tokio::test]
  async fn test_record_set_assigns_set_numbers_per_exercise() {
    let (service, clock) = service();
    let session = service.start_session(date(), 90).await.unwrap();

    let a = service.record_set(new_log(&session.id, "深蹲")).await.unwrap();
    clock.advance(Duration::seconds(60));
    let b = service.record_set(new_log(&session.id, "深蹲")).await.unwrap();
    clock.advance(Duration::seconds(60));
    let c = service.record_set(new_log(&session.id, "硬拉")).await.unwrap();

    assert_eq!((a.set_number, b.set_number, c.set_number), (1, 2, 1));

    let loaded = service.get_session(&session.id).await.unwrap().unwrap();
    let order: Vec<_> = loaded.logs.iter().map(|l| (l.exercise.as_str(), l.set_number)).collect();
    assert_eq!(order, vec![("硬拉", 1), ("深蹲", 2), ("深蹲", 1)]);
  }

  #[tokio::test]
  async fn test_record_set_requires_exercise() {
    let (service, _clock) = service();

    let result = service.record_set(new_log("s1", "  ")).await;

    assert!(matches!(result, Err(SessionError::MissingExercise)));
  }

  #[tokio::test]
  async fn test_complete_session_is_one_way() {
    // Arrange
    let (service, clock) = service();
    let session = service.start_session(date(), 90).await.unwrap();

    // Act
    let done = service.complete_session(&session.id, None).await.unwrap();
    clock.advance(Duration::minutes(5));
    let again = service
      .complete_session(&session.id, Some("felt strong".to_string()))
      .await
      .unwrap();

    // Assert
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(again.completed_at, done.completed_at);
    assert_eq!(again.notes.as_deref(), Some("felt strong"));
    assert!(service.get_active_session(date()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_complete_unknown_session() {
    let (service, _clock) = service();

    let result = service.complete_session("missing", None).await;

    assert!(matches!(result, Err(SessionError::NotFound(_))));
    assert!(service.get_session("missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_history_and_sessions_map() {
    let (service, clock) = service();
    let session = service.start_session(date(), 90).await.unwrap();
    for _ in 0..3 {
      service.record_set(new_log(&session.id, "深蹲")).await.unwrap();
      clock.advance(Duration::seconds(30));
    }

    let history = service.list_recent_history(2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].set_number, 3);

    let ids: Vec<String> = history.iter().map(|l| l.session_id.clone()).collect();
    let sessions = service.fetch_sessions_map(&ids).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[&session.id].plan_date, date());
    assert!(service.fetch_sessions_map(&[]).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_rest_finishes_at_offsets_clock() {
    let (service, clock) = service();

    assert_eq!(service.rest_finishes_at(90), clock.now() + Duration::seconds(90));
  }

  #[tokio::test]
  async fn test_lifecycle_on_sqlite() {
    // Arrange
    let pool = setup_test_db().await;
    let clock = Arc::new(ManualClock::default());
    let service = TrainingSessionService::new(Arc::new(SqliteStore::new(pool.clone())), clock.clone());

    // Act
    let session = service.start_session(date(), 90).await.unwrap();
    service.record_set(new_log(&session.id, "深蹲")).await.unwrap();
    clock.advance(Duration::seconds(45));
    let second = service.record_set(new_log(&session.id, "深蹲")).await.unwrap();
    let resumed = service.start_session(date(), 90).await.unwrap();
    let done = service.complete_session(&session.id, None).await.unwrap();

    // Assert
    assert_eq!(second.set_number, 2);
    assert_eq!(resumed.id, session.id);
    assert_eq!(resumed.logs.len(), 2);
    assert_eq!(resumed.logs[0].set_number, 2);
    assert_eq!(done.status, SessionStatus::Completed);

    teardown_test_db(pool).await;
  }
}
