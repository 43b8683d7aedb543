//! Plan Summarizer
//!
//! Turns a stored [`PlanRecord`] into [`ExerciseDescriptor`]s: targets for
//! sets, reps, weight and rest, plus whether the row takes part in session
//! progression at all.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::classifier::{categorize, split_combination, Category};
use crate::models::PlanRecord;
use crate::rest::{first_integer, has_positive_number, integers, parse_rest_seconds};

static SET_REP_PAIR: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(\d+)\s*[xX×*]\s*(\d+)").expect("valid pair pattern"));
static SETS_IN_VALUE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:组|sets?\b)").expect("valid sets pattern"));
static REPS_IN_VALUE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:次|reps?\b)").expect("valid reps pattern"));

/// One normalized plan row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseDescriptor {
  pub exercise_name: String,
  pub phase: Option<String>,
  /// Empty unless this is a combination
  pub components: Vec<String>,
  pub primary_component: String,
  pub is_combination: bool,
  pub target_sets: Option<u32>,
  pub target_reps: Option<u32>,
  pub target_weight: Option<String>,
  pub target_rest_seconds: Option<u32>,
  pub details: Vec<String>,
  pub is_trackable: bool,
  pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
  pub phase: Option<String>,
  pub remarks: Vec<String>,
  pub exercises: Vec<ExerciseDescriptor>,
  pub default_rest_seconds: Option<u32>,
  pub trackable_exercise_count: usize,
  pub note_exercise_count: usize,
  pub is_rest_day: bool,
}

impl PlanSummary {
  /// Summary of a day with no plan at all
  pub fn rest_day() -> Self {
    Self {
      phase: None,
      remarks: Vec::new(),
      exercises: Vec::new(),
      default_rest_seconds: None,
      trackable_exercise_count: 0,
      note_exercise_count: 0,
      is_rest_day: true,
    }
  }

  pub fn trackable(&self) -> impl Iterator<Item = &ExerciseDescriptor> {
    self.exercises.iter().filter(|e| e.is_trackable)
  }

  pub fn default_rest_or(&self, fallback: u32) -> u32 {
    self.default_rest_seconds.filter(|s| *s > 0).unwrap_or(fallback)
  }
}

// ---------------------------------------------------------------------------
/// Column labels
// ---------------------------------------------------------------------------

fn is_sets_label(header: &str) -> bool {
  header.contains('组') || header.to_lowercase().contains("set")
}

fn is_reps_label(header: &str) -> bool {
  header.contains('次') || header.to_lowercase().contains("rep")
}

fn is_weight_label(header: &str) -> bool {
  header.contains('重') || header.to_lowercase().contains("kg")
}

fn is_rest_label(header: &str) -> bool {
  header.contains("休息") || header.contains("间隔") || header.to_lowercase().contains("rest")
}

fn unit_number(pattern: &Regex, value: &str) -> Option<u32> {
  pattern
    .captures(value)
    .and_then(|caps| caps.get(1))
    .and_then(|m| m.as_str().parse().ok())
}

fn set_rep_pair(value: &str) -> Option<(u32, u32)> {
  let caps = SET_REP_PAIR.captures(value)?;
  Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Non-empty numeric content that is zero everywhere
fn is_zero_only(values: &[String]) -> bool {
  let mut numbers = values.iter().flat_map(|v| integers(v)).peekable();
  numbers.peek().is_some() && numbers.all(|n| n == 0)
}

// ---------------------------------------------------------------------------
/// Row → descriptor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Targets {
  sets: Option<u32>,
  reps: Option<u32>,
  weight: Option<String>,
  rest: Option<u32>,
}

/// Scan the non-name cells. Labeled columns win over value-side hints; an
/// `AxB` pair only fills what no label provided.
fn scan_targets(headers: &[String], values: &[String]) -> (Targets, Vec<String>) {
  let mut targets = Targets::default();
  let mut details = Vec::new();
  let mut pair = None;

  for (header, value) in headers.iter().zip(values).skip(1) {
    if value.is_empty() {
      continue;
    }
    let header = header.trim();
    details.push(format!("{}: {}", header, value));
    let lowered = value.to_lowercase();

    if targets.sets.is_none() {
      targets.sets = if is_sets_label(header) {
        first_integer(value)
      } else {
        unit_number(&SETS_IN_VALUE, value)
      };
    }
    if targets.reps.is_none() {
      targets.reps = if is_reps_label(header) {
        first_integer(value)
      } else {
        unit_number(&REPS_IN_VALUE, value)
      };
    }
    if targets.weight.is_none() && (is_weight_label(header) || lowered.contains("kg")) {
      targets.weight = Some(value.clone());
    }
    if targets.rest.is_none()
      && (is_rest_label(header) || value.contains("休息") || lowered.contains("rest"))
    {
      targets.rest = parse_rest_seconds(value);
    }
    if pair.is_none() {
      pair = set_rep_pair(value);
    }
  }

  if let Some((sets, reps)) = pair {
    targets.sets.get_or_insert(sets);
    targets.reps.get_or_insert(reps);
  }

  // Zero means "not given"
  targets.sets = targets.sets.filter(|&n| n > 0);
  targets.reps = targets.reps.filter(|&n| n > 0);

  if targets.rest.is_none() {
    targets.rest = values.iter().skip(1).find_map(|v| parse_rest_seconds(v));
  }

  (targets, details)
}

fn describe_row(
  row_index: usize,
  headers: &[String],
  values: &[String],
  phase: Option<&str>,
) -> Option<ExerciseDescriptor> {
  if values.iter().all(|v| v.is_empty()) {
    return None;
  }

  let name = match values.first().map(String::as_str) {
    Some(name) if !name.is_empty() => name.to_string(),
    _ => format!("未命名动作{}", row_index),
  };

  let others = values.get(1..).unwrap_or_default();
  if is_zero_only(others) {
    debug!(exercise = %name, "Skipping zero-only row");
    return None;
  }

  let parts = split_combination(&name);
  let is_combination = parts.len() > 1;
  let components = if is_combination { parts } else { Vec::new() };
  let primary_component = components.first().cloned().unwrap_or_else(|| name.clone());

  let (mut targets, details) = scan_targets(headers, values);

  let mut category = categorize(&name);
  let is_trackable = category == Category::Exercise
    && (targets.sets.is_some() || targets.reps.is_some() || others.iter().any(|v| has_positive_number(v)));

  if !is_trackable {
    if category == Category::Exercise {
      category = Category::Note;
    }
    targets.sets = None;
    targets.reps = None;
    targets.rest = None;
  }

  Some(ExerciseDescriptor {
    exercise_name: name,
    phase: phase.map(str::to_string),
    components,
    primary_component,
    is_combination,
    target_sets: targets.sets,
    target_reps: targets.reps,
    target_weight: targets.weight,
    target_rest_seconds: targets.rest,
    details,
    is_trackable,
    category,
  })
}

/// Summarize a day's plan; `None` yields an empty rest-day summary
pub fn summarize(plan: Option<&PlanRecord>) -> PlanSummary {
  let Some(plan) = plan else {
    return PlanSummary::rest_day();
  };

  let values_of = |row: &Vec<String>| row.iter().map(|v| v.trim().to_string()).collect::<Vec<_>>();
  let phase = plan.phase.as_deref();

  let exercises: Vec<ExerciseDescriptor> = plan
    .plan_data
    .iter()
    .enumerate()
    .filter_map(|(idx, row)| describe_row(idx + 1, &plan.headers, &values_of(row), phase))
    .collect();

  let default_rest_seconds = exercises
    .iter()
    .filter(|e| e.is_trackable)
    .find_map(|e| e.target_rest_seconds);
  let trackable_exercise_count = exercises.iter().filter(|e| e.is_trackable).count();
  let note_exercise_count = exercises.len() - trackable_exercise_count;

  PlanSummary {
    phase: plan.phase.clone(),
    remarks: plan.remarks.clone(),
    exercises,
    default_rest_seconds,
    trackable_exercise_count,
    note_exercise_count,
    is_rest_day: trackable_exercise_count == 0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::mock_plan_record;
  use chrono::NaiveDate;

  fn plan(headers: &[&str], rows: &[&[&str]]) -> PlanRecord {
    PlanRecord {
      date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
      phase: Some("测试阶段".to_string()),
      headers: headers.iter().map(|h| h.to_string()).collect(),
      remarks: Vec::new(),
      plan_data: rows
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect(),
    }
  }

  #[test]
  fn test_summarize_labeled_columns() {
    // Arrange
    let record = mock_plan_record(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

    // Act
    let summary = summarize(Some(&record));

    // Assert
    assert_eq!(summary.phase.as_deref(), Some("测试阶段"));
    assert_eq!(summary.default_rest_seconds, Some(90));
    assert_eq!(summary.trackable_exercise_count, 2);
    assert!(!summary.is_rest_day);

    let squat = &summary.exercises[0];
    assert_eq!(squat.exercise_name, "深蹲");
    assert_eq!(squat.target_sets, Some(3));
    assert_eq!(squat.target_reps, Some(12));
    assert_eq!(squat.target_rest_seconds, Some(90));
    assert_eq!(squat.details, vec!["组数: 3", "次数: 12", "休息: 90秒"]);
    assert_eq!(squat.category, Category::Exercise);
    assert_eq!(squat.primary_component, "深蹲");
    assert!(squat.components.is_empty());

    assert_eq!(summary.exercises[1].target_rest_seconds, Some(120));
  }

  #[test]
  fn test_summarize_none_is_rest_day() {
    let summary = summarize(None);

    assert!(summary.is_rest_day);
    assert!(summary.exercises.is_empty());
    assert_eq!(summary.default_rest_seconds, None);
    assert_eq!(summary.default_rest_or(90), 90);

    let zero_rest = PlanSummary {
      default_rest_seconds: Some(0),
      ..PlanSummary::rest_day()
    };
    assert_eq!(zero_rest.default_rest_or(90), 90);
  }

  #[test]
  fn test_rest_row_is_untrackable() {
    let record = plan(&["动作", "组数", "次数", "休息", "备注"], &[&["休息", "", "", "", ""]]);

    let summary = summarize(Some(&record));

    assert!(summary.is_rest_day);
    assert_eq!(summary.trackable_exercise_count, 0);
    assert_eq!(summary.note_exercise_count, 1);
    assert_eq!(summary.exercises[0].category, Category::Rest);
  }

  #[test]
  fn test_zero_only_rows_are_dropped() {
    let record = plan(
      &["动作", "组数", "次数", "休息"],
      &[&["深蹲", "0", "0", "0"], &["硬拉", "3", "5", "2分钟"]],
    );

    let summary = summarize(Some(&record));

    assert_eq!(summary.exercises.len(), 1);
    assert_eq!(summary.exercises[0].exercise_name, "硬拉");
    assert_eq!(summary.exercises[0].target_rest_seconds, Some(120));
  }

  #[test]
  fn test_combination_row() {
    let record = plan(&["动作", "组数", "次数"], &[&["垫铃高拉+短触地跌落跳", "4", "3"]]);

    let summary = summarize(Some(&record));
    let entry = &summary.exercises[0];

    assert!(entry.is_combination);
    assert_eq!(entry.components, vec!["垫铃高拉", "短触地跌落跳"]);
    assert_eq!(entry.primary_component, "垫铃高拉");
    assert_eq!(entry.exercise_name, "垫铃高拉+短触地跌落跳");
  }

  #[test]
  fn test_pair_and_value_side_units() {
    let record = plan(
      &["动作", "内容", "负重", "备注"],
      &[
        &["卧推", "4x8", "60kg", "组间休息2分钟"],
        &["划船", "3组 10次", "", ""],
      ],
    );

    let summary = summarize(Some(&record));
    let bench = &summary.exercises[0];
    let row = &summary.exercises[1];

    assert_eq!(bench.target_sets, Some(4));
    assert_eq!(bench.target_reps, Some(8));
    assert_eq!(bench.target_weight.as_deref(), Some("60kg"));
    assert_eq!(bench.target_rest_seconds, Some(120));
    assert_eq!(row.target_sets, Some(3));
    assert_eq!(row.target_reps, Some(10));
  }

  #[test]
  fn test_labeled_column_beats_pair() {
    let record = plan(&["动作", "组数", "说明"], &[&["深蹲", "5", "3x12"]]);

    let entry = &summarize(Some(&record)).exercises[0];

    assert_eq!(entry.target_sets, Some(5));
    assert_eq!(entry.target_reps, Some(12));
  }

  #[test]
  fn test_warmup_and_blank_name() {
    let record = plan(
      &["动作", "组数", "次数"],
      &[&["热身跑", "1", "10"], &["", "3", "12"], &["", "", ""]],
    );

    let summary = summarize(Some(&record));

    assert_eq!(summary.exercises.len(), 2);
    let warmup = &summary.exercises[0];
    assert_eq!(warmup.category, Category::Warmup);
    assert!(!warmup.is_trackable);
    assert_eq!(warmup.target_sets, None);
    assert_eq!(warmup.target_rest_seconds, None);

    assert_eq!(summary.exercises[1].exercise_name, "未命名动作2");
    assert!(summary.exercises[1].is_trackable);
  }

  #[test]
  fn test_exercise_without_numbers_becomes_note() {
    let record = plan(&["动作", "备注"], &[&["核心训练", "自由发挥"]]);

    let entry = &summarize(Some(&record)).exercises[0];

    assert!(!entry.is_trackable);
    assert_eq!(entry.category, Category::Note);
  }

  #[test]
  fn test_default_rest_comes_from_first_trackable_row() {
    let record = plan(
      &["动作", "组数", "休息"],
      &[&["拉伸", "1", "30秒"], &["深蹲", "3", "75秒"], &["硬拉", "3", "2分钟"]],
    );

    let summary = summarize(Some(&record));

    assert_eq!(summary.default_rest_seconds, Some(75));
    assert_eq!(summary.trackable().count(), 2);
  }
}
