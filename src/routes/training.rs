use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use super::{f64_field, parse_body, parse_date, string_field, to_json, u32_field, ApiError, ApiResult, Body};
use crate::db::AppState;
use crate::models::{timestamp, NewSetLog, TrainingSession};
use crate::progression::{next_step, NextStep};
use crate::session::SessionError;
use crate::summary::{summarize, PlanSummary};

fn missing_session_id() -> ApiError {
  ApiError::bad_request("Missing session_id")
}

fn session_not_found() -> ApiError {
  ApiError::NotFound("Session not found".to_string())
}

// ---------------------------------------------------------------------------
/// Payload building
// ---------------------------------------------------------------------------

/// Next-step fields; without a step the current-* keys are null
fn insert_step(payload: &mut Body, step: Option<&NextStep>) {
  let Some(step) = step else {
    payload.insert("current_exercise".into(), Value::Null);
    payload.insert("current_set".into(), Value::Null);
    payload.insert("target_rest_seconds".into(), Value::Null);
    payload.insert("is_combination".into(), json!(false));
    payload.insert("components".into(), json!([]));
    payload.insert("primary_component".into(), Value::Null);
    return;
  };

  let exercise = &step.exercise;
  payload.insert("current_exercise".into(), json!(exercise.exercise_name));
  payload.insert("current_set".into(), json!(step.next_set));
  payload.insert("target_sets".into(), json!(exercise.target_sets));
  payload.insert("target_reps".into(), json!(exercise.target_reps));
  payload.insert("target_weight".into(), json!(exercise.target_weight));
  payload.insert("target_rest_seconds".into(), json!(exercise.target_rest_seconds));
  payload.insert("details".into(), json!(exercise.details));
  payload.insert("is_combination".into(), json!(exercise.is_combination));
  payload.insert("components".into(), json!(exercise.components));
  payload.insert("primary_component".into(), json!(exercise.primary_component));
}

/// Session, plan and the step derived from the session's logs
fn session_payload(session: &TrainingSession, summary: &PlanSummary) -> ApiResult<Body> {
  let step = next_step(summary, &session.logs);
  let status = if session.is_active() && step.is_some() {
    "active"
  } else {
    "completed"
  };

  let mut payload = Body::new();
  payload.insert("status".into(), json!(status));
  payload.insert("session".into(), to_json(session)?);
  payload.insert("plan".into(), to_json(summary)?);
  insert_step(&mut payload, step.as_ref());
  Ok(payload)
}

/// Rest target of an exercise; zero counts as unset
fn target_rest(step: &NextStep) -> Option<u32> {
  step.exercise.target_rest_seconds.filter(|s| *s > 0)
}

async fn summary_for(state: &AppState, session: &TrainingSession) -> ApiResult<PlanSummary> {
  let plan = state.plans.plan_for_date(session.plan_date).await?;
  Ok(summarize(plan.as_ref()))
}

// ---------------------------------------------------------------------------
/// Session lifecycle
// ---------------------------------------------------------------------------

/// POST /api/start-training {date?, rest_interval_seconds?}
pub async fn start_training(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
  let body = parse_body(&body)?;
  let date = parse_date(string_field(&body, "date").as_deref(), state.clock.as_ref())?;

  let plan = state.plans.plan_for_date(date).await?;
  let summary = summarize(plan.as_ref());
  if summary.trackable().next().is_none() {
    info!(%date, "No trackable exercises, refusing to start");
    return Err(ApiError::bad_request("今天没有需要记录的训练项目"));
  }

  let rest_interval = match u32_field(&body, "rest_interval_seconds")? {
    Some(seconds) if seconds > 0 => seconds,
    _ => summary.default_rest_or(state.config.default_rest_seconds),
  };
  let session = state.sessions.start_session(date, rest_interval).await?;

  let mut payload = session_payload(&session, &summary)?;
  payload.insert("plan_date".into(), json!(date.to_string()));
  payload.insert("default_rest_seconds".into(), json!(summary.default_rest_seconds));
  Ok(Json(Value::Object(payload)))
}

/// POST /api/next-set
///
/// Logs the set the engine expects next, then answers with the following
/// step and its rest countdown, or completes the session when nothing is
/// left.
pub async fn next_set(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
  let body = parse_body(&body)?;
  let session_id = string_field(&body, "session_id").ok_or_else(missing_session_id)?;
  let actual_reps = u32_field(&body, "actual_reps")?;
  let rpe = f64_field(&body, "rpe")?;
  let manual_rest = u32_field(&body, "rest_interval_seconds")?.filter(|s| *s > 0);

  let session = state
    .sessions
    .get_session(&session_id)
    .await?
    .ok_or_else(session_not_found)?;
  if !session.is_active() {
    return Ok(Json(json!({ "status": "completed", "session": to_json(&session)? })));
  }

  let summary = summary_for(&state, &session).await?;
  let Some(step) = next_step(&summary, &session.logs) else {
    let completed = state.sessions.complete_session(&session_id, None).await?;
    return Ok(Json(json!({ "status": "completed", "session": to_json(&completed)? })));
  };

  let log_rest = manual_rest
    .or_else(|| target_rest(&step))
    .unwrap_or(session.rest_interval_seconds);
  let log = state
    .sessions
    .record_set(NewSetLog {
      session_id: session_id.clone(),
      exercise: step.exercise_name().to_string(),
      set_number: Some(step.next_set),
      actual_reps,
      actual_weight: string_field(&body, "actual_weight"),
      rpe,
      rest_seconds: Some(log_rest),
      notes: string_field(&body, "notes"),
    })
    .await
    .map_err(|err| match err {
      SessionError::Store(cause) => ApiError::internal("无法记录训练组", cause),
      other => other.into(),
    })?;

  let updated = state
    .sessions
    .get_session(&session_id)
    .await?
    .ok_or_else(session_not_found)?;

  let Some(following) = next_step(&summary, &updated.logs) else {
    let completed = state.sessions.complete_session(&session_id, None).await?;
    return Ok(Json(json!({
      "status": "completed",
      "session": to_json(&completed)?,
      "last_log": to_json(&log)?,
    })));
  };

  // A manual rest also drives the countdown before the following set
  let rest_seconds = manual_rest
    .or_else(|| target_rest(&following))
    .unwrap_or(updated.rest_interval_seconds);
  let rest_end = state.sessions.rest_finishes_at(rest_seconds);

  let mut payload = Body::new();
  payload.insert("status".into(), json!("rest"));
  insert_step(&mut payload, Some(&following));
  payload.insert("rest_seconds".into(), json!(rest_seconds));
  payload.insert("rest_end_time".into(), json!(timestamp::format(&rest_end)));
  payload.insert("session".into(), to_json(&updated)?);
  payload.insert("last_log".into(), to_json(&log)?);
  Ok(Json(Value::Object(payload)))
}

/// GET /api/current-session?date=YYYY-MM-DD
pub async fn current_session(
  State(state): State<AppState>,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
  let date = parse_date(params.get("date").map(String::as_str), state.clock.as_ref())?;

  let Some(session) = state.sessions.get_active_session(date).await? else {
    return Ok(Json(json!({ "status": "no_session" })));
  };

  let summary = summary_for(&state, &session).await?;
  let mut payload = session_payload(&session, &summary)?;
  payload.insert("status".into(), json!(session.status.as_str()));
  payload.insert("plan_date".into(), json!(session.plan_date.to_string()));
  payload.insert("default_rest_seconds".into(), json!(summary.default_rest_seconds));
  Ok(Json(Value::Object(payload)))
}

/// POST /api/finish-training {session_id, notes?}
pub async fn finish_training(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
  let body = parse_body(&body)?;
  let session_id = string_field(&body, "session_id").ok_or_else(missing_session_id)?;

  let session = state
    .sessions
    .complete_session(&session_id, string_field(&body, "notes"))
    .await?;
  let summary = summary_for(&state, &session).await?;

  Ok(Json(json!({
    "status": "completed",
    "session": to_json(&session)?,
    "plan": to_json(&summary)?,
  })))
}

// ---------------------------------------------------------------------------
/// History
// ---------------------------------------------------------------------------

/// GET /api/training-history?limit=N
pub async fn training_history(
  State(state): State<AppState>,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
  let limit = match params.get("limit").map(|l| l.trim()) {
    None | Some("") => state.config.history_limit,
    Some(raw) => raw
      .parse::<usize>()
      .map_err(|_| ApiError::bad_request("无效的 limit 参数"))?,
  };

  let logs = state.sessions.list_recent_history(limit).await?;
  let session_ids: Vec<String> = logs.iter().map(|log| log.session_id.clone()).collect();
  let sessions = state.sessions.fetch_sessions_map(&session_ids).await?;

  let history: Vec<Value> = logs
    .iter()
    .map(|log| {
      json!({
        "session_id": log.session_id,
        "exercise_name": log.exercise,
        "set_number": log.set_number,
        "actual_reps": log.actual_reps,
        "actual_weight": log.actual_weight,
        "notes": log.notes,
        "rest_seconds": log.rest_seconds,
        "log_date": timestamp::format(&log.completed_at),
        "plan_date": sessions.get(&log.session_id).map(|s| s.plan_date.to_string()),
      })
    })
    .collect();

  Ok(Json(Value::Array(history)))
}
