use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, Duration, NaiveDate};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{parse_date, to_json, ApiError, ApiResult};
use crate::db::AppState;
use crate::extraction::WEEKDAY_LABELS;
use crate::import::{import_workbook, ImportError, ImportOptions};
use crate::models::PlanRecord;
use crate::summary::summarize;
use crate::workbook::read_workbook;

const NO_FILE: &str = "未选择文件";
const IMPORT_FAILED: &str = "导入失败，请检查文件内容";
const UPLOAD_FAILED: &str = "上传失败";

// ---------------------------------------------------------------------------
/// Plan views
// ---------------------------------------------------------------------------

/// GET /api/today-plan?date=YYYY-MM-DD
pub async fn today_plan(
  State(state): State<AppState>,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
  let date = parse_date(params.get("date").map(String::as_str), state.clock.as_ref())?;
  let plan = state.plans.plan_for_date(date).await?;

  let mut payload = to_json(&summarize(plan.as_ref()))?;
  if let Value::Object(map) = &mut payload {
    map.insert("date".into(), json!(date.to_string()));
  }
  Ok(Json(payload))
}

fn plan_view(date: NaiveDate, plan: Option<&PlanRecord>) -> Value {
  match plan {
    Some(plan) => json!({
      "date": date.to_string(),
      "has_plan": true,
      "phase": plan.phase,
      "remarks": plan.remarks,
      "headers": plan.headers,
      "rows": plan.plan_data,
    }),
    None => json!({
      "date": date.to_string(),
      "has_plan": false,
      "phase": null,
      "remarks": [],
      "headers": [],
      "rows": [],
    }),
  }
}

/// GET /api/plans/:date
pub async fn plan_by_date(
  State(state): State<AppState>,
  Path(date): Path<String>,
) -> ApiResult<(StatusCode, Json<Value>)> {
  let date = parse_date(Some(&date), state.clock.as_ref())?;
  let plan = state.plans.plan_for_date(date).await?;

  let status = if plan.is_some() {
    StatusCode::OK
  } else {
    info!(%date, "Plan not found");
    StatusCode::NOT_FOUND
  };
  Ok((status, Json(plan_view(date, plan.as_ref()))))
}

/// GET /api/week?week=N, Monday-based
pub async fn week(
  State(state): State<AppState>,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
  let week_offset: i64 = match params.get("week").map(|w| w.trim()) {
    None | Some("") => 0,
    Some(raw) => raw
      .parse()
      .map_err(|_| ApiError::bad_request("无效的周参数"))?,
  };

  let today = state.clock.today();
  let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
  let dates: Vec<NaiveDate> = Duration::try_weeks(week_offset)
    .and_then(|offset| monday.checked_add_signed(offset))
    .and_then(|start| (0..7).map(|i| start.checked_add_signed(Duration::days(i))).collect())
    .ok_or_else(|| ApiError::bad_request("无效的周参数"))?;

  let plans = state.plans.plans_for_dates(&dates).await?;

  let days: Vec<Value> = dates
    .iter()
    .zip(WEEKDAY_LABELS)
    .map(|(date, day_name)| {
      let mut view = plan_view(*date, plans.get(date));
      view["day_name"] = json!(day_name);
      view
    })
    .collect();

  info!(week_offset, start = %dates[0], training_days = plans.len(), "Week plans fetched");
  Ok(Json(json!({
    "week_offset": week_offset,
    "start_date": dates[0].to_string(),
    "end_date": dates[6].to_string(),
    "training_days": plans.len(),
    "days": days,
  })))
}

// ---------------------------------------------------------------------------
/// Upload
// ---------------------------------------------------------------------------

/// POST /api/upload-plan (multipart field `file`)
pub async fn upload_plan(
  State(state): State<AppState>,
  multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
  let mut multipart = multipart.map_err(|_| ApiError::bad_request(NO_FILE))?;
  let config = &state.config;
  let too_large = format!("文件过大，限制 {}MB", config.max_upload_bytes / (1024 * 1024));

  let mut upload = None;
  loop {
    let field = match multipart.next_field().await {
      Ok(Some(field)) => field,
      Ok(None) => break,
      Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Err(ApiError::bad_request(too_large)),
      Err(e) => return Err(ApiError::internal(UPLOAD_FAILED, e)),
    };
    if field.name() != Some("file") {
      continue;
    }

    let filename = field.file_name().unwrap_or_default().to_string();
    if filename.is_empty() {
      return Err(ApiError::bad_request(NO_FILE));
    }
    if !config.is_allowed_file(&filename) {
      let allowed: Vec<String> = config.allowed_extensions.iter().map(|e| format!(".{}", e)).collect();
      return Err(ApiError::bad_request(format!("文件类型不支持，仅支持 {}", allowed.join(", "))));
    }

    let bytes = match field.bytes().await {
      Ok(bytes) => bytes,
      Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Err(ApiError::bad_request(too_large)),
      Err(e) => return Err(ApiError::internal(UPLOAD_FAILED, e)),
    };
    upload = Some((filename, bytes));
    break;
  }

  let Some((filename, bytes)) = upload else {
    return Err(ApiError::bad_request(NO_FILE));
  };
  if bytes.len() > config.max_upload_bytes {
    return Err(ApiError::bad_request(too_large));
  }
  info!(%filename, size = bytes.len(), "Importing workout plan");

  let sheets = tokio::task::spawn_blocking(move || read_workbook(&bytes))
    .await
    .map_err(|e| ApiError::internal(UPLOAD_FAILED, e))?
    .map_err(|e| {
      warn!(error = %e, "Workbook could not be read");
      ApiError::bad_request(IMPORT_FAILED)
    })?;

  let options = ImportOptions {
    min_stage: config.min_stage,
    year: state.clock.today().year(),
  };
  match import_workbook(&state.plans, &sheets, options).await {
    Ok(report) => {
      info!(
        scanned = report.sheets_scanned,
        skipped = report.sheets_skipped,
        duplicates = report.duplicates_dropped,
        imported = report.records_imported,
        "Workout plan uploaded"
      );
      Ok(Json(json!({ "message": "训练计划导入成功" })))
    }
    Err(ImportError::Store(e)) => Err(ApiError::internal(UPLOAD_FAILED, e)),
    Err(e) => {
      warn!(error = %e, "Plan import rejected");
      Err(ApiError::bad_request(IMPORT_FAILED))
    }
  }
}
