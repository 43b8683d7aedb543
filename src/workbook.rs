//! `.xlsx` reader: turns an uploaded workbook into one [`SheetGrid`] per sheet

use std::io::Cursor;

use crate::extraction::SheetGrid;

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
  #[error("Workbook is empty")]
  Empty,

  #[error("Unreadable workbook: {0}")]
  Unreadable(String),
}

/// Read every sheet of an xlsx payload as trimmed string cells
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<SheetGrid>, WorkbookError> {
  if bytes.is_empty() {
    return Err(WorkbookError::Empty);
  }

  let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
    .map_err(|e| WorkbookError::Unreadable(e.to_string()))?;

  let sheets = book
    .get_sheet_collection()
    .iter()
    .map(|sheet| {
      let (max_col, max_row) = sheet.get_highest_column_and_row();
      let rows = (1..=max_row)
        .map(|row| {
          (1..=max_col)
            .map(|col| sheet.get_value((col, row)).trim().to_string())
            .collect()
        })
        .collect();
      SheetGrid::new(sheet.get_name(), rows)
    })
    .collect();

  Ok(sheets)
}
