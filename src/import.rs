//! Spreadsheet import: eligible sheets → plan records → full table replace

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::extraction::{extract_sheet, stage_number, SheetGrid, STAGE_MARKER};
use crate::models::PlanRecord;
use crate::plans::PlanRepository;
use crate::store::StoreError;
use crate::workbook::WorkbookError;

/// Lowest stage imported unless configured otherwise
pub const DEFAULT_MIN_STAGE: u32 = 14;

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
  pub min_stage: u32,
  /// Year attached to "month.day" markers
  pub year: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
  pub sheets_scanned: usize,
  pub sheets_skipped: usize,
  pub duplicates_dropped: usize,
  pub records_imported: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
  #[error("Workbook error: {0}")]
  Workbook(#[from] WorkbookError),

  #[error("No plan records found in workbook")]
  NoPlans,

  #[error("Storage error: {0}")]
  Store(#[from] StoreError),
}

/// Records from every eligible sheet, first occurrence of a date winning
pub fn collect_records(sheets: &[SheetGrid], options: ImportOptions) -> (Vec<PlanRecord>, ImportReport) {
  let mut report = ImportReport::default();
  let mut seen: HashSet<NaiveDate> = HashSet::new();
  let mut records = Vec::new();

  let eligible: Vec<&SheetGrid> = sheets.iter().filter(|s| s.name.contains(STAGE_MARKER)).collect();
  if eligible.is_empty() {
    warn!("No sheet name contains '{}'", STAGE_MARKER);
  }

  for sheet in eligible {
    let Some(stage) = stage_number(&sheet.name) else {
      warn!(sheet = %sheet.name, "Cannot read a stage number, skipping sheet");
      report.sheets_skipped += 1;
      continue;
    };
    if stage < options.min_stage {
      info!(sheet = %sheet.name, stage, min_stage = options.min_stage, "Stage below threshold, skipping sheet");
      report.sheets_skipped += 1;
      continue;
    }

    report.sheets_scanned += 1;
    let mut found = 0;
    for record in extract_sheet(sheet, options.year) {
      if !seen.insert(record.date) {
        warn!(sheet = %sheet.name, date = %record.date, "Duplicate plan date, keeping the first");
        report.duplicates_dropped += 1;
        continue;
      }
      records.push(record);
      found += 1;
    }
    info!(sheet = %sheet.name, stage, dates = found, "Sheet processed");
  }

  (records, report)
}

/// Replace all stored plans with the workbook's. Fails without touching the
/// table when the workbook yields nothing.
pub async fn import_workbook(
  repo: &PlanRepository,
  sheets: &[SheetGrid],
  options: ImportOptions,
) -> Result<ImportReport, ImportError> {
  let (records, mut report) = collect_records(sheets, options);
  if records.is_empty() {
    warn!("Import produced no plan records");
    return Err(ImportError::NoPlans);
  }

  report.records_imported = repo.replace_all(&records).await?;
  info!(records = report.records_imported, "Plan import finished");
  Ok(report)
}
