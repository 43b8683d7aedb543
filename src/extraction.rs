//! Plan Extraction
//!
//! Scans a raw sheet grid for completion-marked date cells ("3.15 完成"),
//! walks up to the weekday row that sits above each block, and lifts the
//! block into a [`PlanRecord`]. Everything here is a pure function over an
//! immutable [`SheetGrid`].

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::PlanRecord;

pub const WEEKDAY_LABELS: [&str; 7] = ["周一", "周二", "周三", "周四", "周五", "周六", "周日"];
pub const UNKNOWN_PHASE: &str = "未知阶段";
pub const STAGE_MARKER: &str = "阶段";

const COMPLETION_KEYWORD: &str = "完成";
const HEADER_WIDTH: usize = 5;
const REMARK_WIDTH: usize = 6;

// ---------------------------------------------------------------------------
/// Grid abstraction
// ---------------------------------------------------------------------------

/// One worksheet as rows of string cells. Rows may be ragged; missing cells
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
  pub name: String,
  rows: Vec<Vec<String>>,
  width: usize,
}

impl SheetGrid {
  pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    Self {
      name: name.into(),
      rows,
      width,
    }
  }

  pub fn height(&self) -> usize {
    self.rows.len()
  }

  /// Widest row
  pub fn width(&self) -> usize {
    self.width
  }

  pub fn cell(&self, row: usize, col: usize) -> &str {
    self
      .rows
      .get(row)
      .and_then(|r| r.get(col))
      .map(String::as_str)
      .unwrap_or("")
  }

  /// Cells `[col, col + len)` of `row`, clipped to the grid width
  fn span(&self, row: usize, col: usize, len: usize) -> Vec<String> {
    let end = (col + len).min(self.width());
    (col..end).map(|c| self.cell(row, c).to_string()).collect()
  }
}

// ---------------------------------------------------------------------------
/// Date markers
// ---------------------------------------------------------------------------

/// A cell that looks like "M.D 完成"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMarker {
  pub row: usize,
  pub col: usize,
  pub text: String,
}

impl DateMarker {
  /// `(month, day)` when the leading part is exactly two numbers
  pub fn month_day(&self) -> Option<(u32, u32)> {
    let leading = leading_part(&self.text);
    let mut parts = leading.split('.');
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
      return None;
    }
    Some((month, day))
  }

  pub fn date_in(&self, year: i32) -> Option<NaiveDate> {
    let (month, day) = self.month_day()?;
    NaiveDate::from_ymd_opt(year, month, day)
  }
}

fn leading_part(text: &str) -> &str {
  text.split(' ').next().unwrap_or("")
}

/// Whether a cell carries a completion-marked date
pub fn is_date_marker(text: &str) -> bool {
  if !text.contains('.') || !text.contains(COMPLETION_KEYWORD) {
    return false;
  }
  leading_part(text)
    .split('.')
    .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Every date marker in row-major order
pub fn find_date_markers(grid: &SheetGrid) -> Vec<DateMarker> {
  grid
    .rows
    .iter()
    .enumerate()
    .flat_map(|(row, cells)| {
      cells.iter().enumerate().filter_map(move |(col, text)| {
        is_date_marker(text).then(|| DateMarker {
          row,
          col,
          text: text.clone(),
        })
      })
    })
    .collect()
}

/// Nearest weekday row above `date_row`; the header row is the one below it
pub fn find_header_row(grid: &SheetGrid, date_row: usize) -> Option<usize> {
  (0..date_row.min(grid.height()))
    .rev()
    .find(|&i| grid.rows[i].iter().any(|cell| WEEKDAY_LABELS.contains(&cell.as_str())))
    .map(|i| i + 1)
}

fn is_blank_or_zero(cell: &str) -> bool {
  let cell = cell.trim();
  cell.is_empty() || cell == "0"
}

/// Lift the block between `header_row` and `date_row` at `col`
pub fn extract_plan_record(
  grid: &SheetGrid,
  header_row: usize,
  date_row: usize,
  col: usize,
  date: NaiveDate,
) -> PlanRecord {
  let headers = grid.span(header_row, col, HEADER_WIDTH);

  let remarks = grid
    .span(header_row + 1, col, REMARK_WIDTH)
    .into_iter()
    .filter(|r| !r.is_empty())
    .collect();

  let plan_data = (header_row + 2..date_row)
    .map(|row| {
      grid
        .span(row, col, HEADER_WIDTH)
        .into_iter()
        .map(|cell| cell.trim().to_string())
        .collect::<Vec<_>>()
    })
    .filter(|cells| !cells.iter().all(|c| is_blank_or_zero(c)))
    .collect();

  let phase = if header_row > 0 {
    let label = grid.cell(header_row - 1, 0);
    (!label.is_empty()).then(|| label.to_string())
  } else {
    Some(UNKNOWN_PHASE.to_string())
  };

  PlanRecord {
    date,
    phase,
    headers,
    remarks,
    plan_data,
  }
}

/// All plan records in one sheet. Markers without a header row or with an
/// impossible date are skipped; blocks with no rows are not emitted.
pub fn extract_sheet(grid: &SheetGrid, year: i32) -> Vec<PlanRecord> {
  let mut records = Vec::new();

  for marker in find_date_markers(grid) {
    let Some(header_row) = find_header_row(grid, marker.row) else {
      warn!(sheet = %grid.name, row = marker.row, "No header row above date marker, skipping");
      continue;
    };

    let Some(date) = marker.date_in(year) else {
      warn!(sheet = %grid.name, row = marker.row, marker = %marker.text, "Invalid date marker, skipping");
      continue;
    };

    let record = extract_plan_record(grid, header_row, marker.row, marker.col, date);
    if !record.has_rows() {
      debug!(sheet = %grid.name, %date, "Plan block has no rows");
      continue;
    }
    records.push(record);
  }

  records
}

/// Stage number of a sheet name: all its digits concatenated. `None` if the
/// name has no stage marker or no digits.
pub fn stage_number(sheet_name: &str) -> Option<u32> {
  if !sheet_name.contains(STAGE_MARKER) {
    return None;
  }
  let digits: String = sheet_name.chars().filter(char::is_ascii_digit).collect();
  digits.parse().ok()
}
