use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of a spreadsheet plan, as stored in `workout_plans`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
  pub date: NaiveDate,
  pub phase: Option<String>,
  /// Column labels, at most 6
  pub headers: Vec<String>,
  #[serde(default)]
  pub remarks: Vec<String>,
  /// Rows of cells aligned to `headers`
  #[serde(default)]
  pub plan_data: Vec<Vec<String>>,
}

impl PlanRecord {
  pub fn has_rows(&self) -> bool {
    !self.plan_data.is_empty()
  }
}
