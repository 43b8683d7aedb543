use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  #[default]
  Active,
  Completed,
}

impl SessionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Completed => "completed",
    }
  }
}

/// A logged set, as stored in `training_sets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSetLog {
  pub id: String,
  pub session_id: String,
  pub exercise: String,
  pub set_number: u32,
  pub actual_reps: Option<u32>,
  pub actual_weight: Option<String>,
  pub rpe: Option<f64>,
  /// Rest actually applied after this set
  pub rest_seconds: Option<u32>,
  pub notes: Option<String>,
  #[serde(with = "timestamp")]
  pub completed_at: DateTime<Utc>,
}

/// For recording new sets (without id, completed_at)
#[derive(Debug, Clone, Default)]
pub struct NewSetLog {
  pub session_id: String,
  pub exercise: String,
  /// Auto-assigned as max(existing) + 1 when absent
  pub set_number: Option<u32>,
  pub actual_reps: Option<u32>,
  pub actual_weight: Option<String>,
  pub rpe: Option<f64>,
  pub rest_seconds: Option<u32>,
  pub notes: Option<String>,
}

/// One attempt at a day's plan.
///
/// Serialized with `session_id` as the id key; `logs` are most-recent-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
  #[serde(rename = "session_id")]
  pub id: String,
  pub plan_date: NaiveDate,
  pub status: SessionStatus,
  pub rest_interval_seconds: u32,
  #[serde(with = "timestamp")]
  pub started_at: DateTime<Utc>,
  #[serde(with = "timestamp::option", default)]
  pub completed_at: Option<DateTime<Utc>>,
  pub notes: Option<String>,
  #[serde(default)]
  pub metadata: Map<String, Value>,
  #[serde(default)]
  pub logs: Vec<TrainingSetLog>,
}

impl TrainingSession {
  pub fn is_active(&self) -> bool {
    self.status == SessionStatus::Active && self.completed_at.is_none()
  }
}

/// Row shape in `training_sessions`; logs live in their own table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionRecord {
  pub id: String,
  pub plan_date: NaiveDate,
  #[serde(default)]
  pub status: SessionStatus,
  pub rest_interval_seconds: u32,
  #[serde(with = "timestamp")]
  pub started_at: DateTime<Utc>,
  #[serde(with = "timestamp::option", default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub metadata: Option<Map<String, Value>>,
}

impl SessionRecord {
  pub fn into_session(self, logs: Vec<TrainingSetLog>) -> TrainingSession {
    TrainingSession {
      id: self.id,
      plan_date: self.plan_date,
      status: self.status,
      rest_interval_seconds: self.rest_interval_seconds,
      started_at: self.started_at,
      completed_at: self.completed_at,
      notes: self.notes,
      metadata: self.metadata.unwrap_or_default(),
      logs,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_session_serializes_wire_shape() {
    let session = TrainingSession {
      id: "abc".to_string(),
      plan_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
      status: SessionStatus::Active,
      rest_interval_seconds: 90,
      started_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
      completed_at: None,
      notes: None,
      metadata: Map::new(),
      logs: Vec::new(),
    };

    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["session_id"], "abc");
    assert_eq!(json["plan_date"], "2026-03-01");
    assert_eq!(json["status"], "active");
    assert_eq!(json["started_at"], "2026-03-01T08:00:00.000000Z");
    assert!(json["completed_at"].is_null());
    assert_eq!(json["metadata"], serde_json::json!({}));
  }

  #[test]
  fn test_record_defaults_missing_optional_fields() {
    let record: SessionRecord = serde_json::from_value(serde_json::json!({
      "id": "s1",
      "plan_date": "2026-03-01",
      "rest_interval_seconds": 60,
      "started_at": "2026-03-01T08:00:00Z"
    }))
    .unwrap();

    let session = record.into_session(Vec::new());
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.is_active());
    assert!(session.metadata.is_empty());
  }
}
