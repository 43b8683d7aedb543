//! HTTP layer: JSON routes under `/api`

pub mod plans;
pub mod training;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::AppState;
use crate::session::SessionError;
use crate::store::StoreError;

/// Multipart framing allowance on top of the file size cap
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
  let body_limit = state.config.max_upload_bytes.saturating_add(UPLOAD_OVERHEAD_BYTES);

  let api = Router::new()
    .route("/today-plan", get(plans::today_plan))
    .route("/plans/:date", get(plans::plan_by_date))
    .route("/week", get(plans::week))
    .route("/upload-plan", post(plans::upload_plan))
    .route("/start-training", post(training::start_training))
    .route("/next-set", post(training::next_set))
    .route("/current-session", get(training::current_session))
    .route("/finish-training", post(training::finish_training))
    .route("/training-history", get(training::training_history))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(cors_layer(&state.config));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
  let origins: Vec<HeaderValue> = config
    .cors_allow_origins
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();

  CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_credentials(true)
    .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

// ---------------------------------------------------------------------------
/// Error Handling
// ---------------------------------------------------------------------------

/// Client-facing failure; the message is what the user sees
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::BadRequest(message.into())
  }

  /// Log `cause` server-side and answer with `message` only
  pub fn internal(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
    let message = message.into();
    error!(%cause, "{}", message);
    Self::Internal(message)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
    };

    (status, Json(json!({ "error": message }))).into_response()
  }
}

impl From<StoreError> for ApiError {
  fn from(err: StoreError) -> Self {
    ApiError::internal("服务器内部错误", err)
  }
}

impl From<SessionError> for ApiError {
  fn from(err: SessionError) -> Self {
    match err {
      SessionError::NotFound(_) => ApiError::NotFound("Session not found".to_string()),
      SessionError::MissingExercise => ApiError::bad_request("Exercise name is required"),
      SessionError::Store(inner) => inner.into(),
    }
  }
}

// ---------------------------------------------------------------------------
/// Request helpers
// ---------------------------------------------------------------------------

pub(crate) type Body = Map<String, Value>;

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<Value> {
  serde_json::to_value(value).map_err(|e| ApiError::internal("服务器内部错误", e))
}

/// JSON object body; empty or `null` reads as `{}`
pub(crate) fn parse_body(bytes: &Bytes) -> ApiResult<Body> {
  if bytes.iter().all(u8::is_ascii_whitespace) {
    return Ok(Body::new());
  }
  match serde_json::from_slice::<Value>(bytes) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(Value::Null) => Ok(Body::new()),
    _ => Err(ApiError::bad_request("请求格式错误")),
  }
}

/// Non-empty string; numbers are rendered as text
pub(crate) fn string_field(body: &Body, key: &str) -> Option<String> {
  match body.get(key)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn number_field(body: &Body, key: &str) -> ApiResult<Option<f64>> {
  let invalid = || ApiError::bad_request(format!("字段 {} 无效", key));
  match body.get(key) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(invalid),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| invalid()),
    Some(_) => Err(invalid()),
  }
}

/// Non-negative whole number from a JSON number or numeric string
pub(crate) fn u32_field(body: &Body, key: &str) -> ApiResult<Option<u32>> {
  match number_field(body, key)? {
    None => Ok(None),
    Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(Some(n as u32)),
    Some(_) => Err(ApiError::bad_request(format!("字段 {} 无效", key))),
  }
}

pub(crate) fn f64_field(body: &Body, key: &str) -> ApiResult<Option<f64>> {
  number_field(body, key)
}

/// `YYYY-MM-DD`, defaulting to today when absent
pub(crate) fn parse_date(raw: Option<&str>, clock: &dyn Clock) -> ApiResult<NaiveDate> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(clock.today()),
    Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ApiError::bad_request("无效的日期格式")),
  }
}
