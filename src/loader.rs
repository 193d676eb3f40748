use crate::cell::{CellValue, RowRecord};
use crate::error::{Result, VizError};
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use log::debug;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

/// Reads the first sheet of a workbook buffer into row records.
///
/// The first non-empty row of the sheet is the header; every following row
/// becomes one `RowRecord` keyed by the header text. Rows with no content at
/// all are skipped. A sheet with only a header (or nothing) yields an empty
/// vector, which downstream code reports as `VizError::EmptyDataset`.
///
/// # Errors
/// * `VizError::Format` if the buffer is not a workbook calamine can open,
///   or if the workbook has no sheets
///
/// # Examples
/// ```no_run
/// use excelviz::loader::extract_rows;
///
/// let buffer = std::fs::read("sales.xlsx").unwrap();
/// let rows = extract_rows(&buffer).unwrap();
/// println!("{} rows", rows.len());
/// ```
pub fn extract_rows(buffer: &[u8]) -> Result<Vec<RowRecord>> {
    let range = first_sheet(buffer)?;
    let mut iter = range.rows();

    let header = match iter.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    let columns = header_names(header);

    let rows: Vec<RowRecord> = iter
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| RowRecord::new(Arc::clone(&columns), row.iter().map(to_cell_value).collect()))
        .collect();

    debug!("extracted {} rows across {} columns", rows.len(), columns.len());
    Ok(rows)
}

/// Returns the header names of the first sheet, as used by `extract_rows`.
///
/// # Errors
/// * `VizError::Format` under the same conditions as `extract_rows`
pub fn extract_columns(buffer: &[u8]) -> Result<Vec<String>> {
    let range = first_sheet(buffer)?;
    Ok(range
        .rows()
        .next()
        .map(|header| header_names(header).to_vec())
        .unwrap_or_default())
}

fn first_sheet(buffer: &[u8]) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| VizError::Format("workbook has no sheets".to_string()))?;

    Ok(workbook.worksheet_range(&sheet_name)?)
}

/// Turns the header row into column names.
///
/// Blank header cells are named `__EMPTY`, `__EMPTY_1`, ... and repeated
/// names get a `_1`, `_2` suffix, so every column stays addressable.
fn header_names(header: &[Data]) -> Arc<[String]> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for cell in header {
        let base = match to_cell_value(cell) {
            CellValue::Empty => "__EMPTY".to_string(),
            value => value.to_string().trim().to_string(),
        };
        let base = if base.is_empty() { "__EMPTY".to_string() } else { base };

        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names.into()
}

fn to_cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Dates keep their serial number, as the spreadsheet stores them
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
