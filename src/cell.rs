use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// A single spreadsheet cell as read from the first sheet of an upload.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Empty => Ok(()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Empty => serializer.serialize_none(),
        }
    }
}

/// Formats a number the way a spreadsheet shows it: whole numbers without a
/// fractional part, everything else with the shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One data row, keyed by the header row of the sheet it came from.
///
/// Rows extracted from the same sheet share one `columns` allocation, so the
/// key set is identical across them. Cells missing from the sheet are stored
/// as `CellValue::Empty`.
#[derive(Clone, Debug, PartialEq)]
pub struct RowRecord {
    columns: Arc<[String]>,
    values: Vec<CellValue>,
}

impl RowRecord {
    /// Builds a row, padding or cutting `values` to the header width.
    pub fn new(columns: Arc<[String]>, mut values: Vec<CellValue>) -> Self {
        values.resize(columns.len(), CellValue::Empty);
        RowRecord { columns, values }
    }

    /// Looks a cell up by column name. Unknown columns return `None`.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Iterates `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Convenience for building rows by hand, mostly in tests and demos.
///
/// Every row gets the same header. Non-empty cells are kept as text, the way
/// a CSV-style upload would arrive; empty strings become `CellValue::Empty`.
pub fn rows_from_strings(headers: &[&str], data: &[&[&str]]) -> Vec<RowRecord> {
    let columns: Arc<[String]> = headers.iter().map(|h| h.to_string()).collect();
    data.iter()
        .map(|row| {
            let values = row
                .iter()
                .map(|s| {
                    if s.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(s.to_string())
                    }
                })
                .collect();
            RowRecord::new(Arc::clone(&columns), values)
        })
        .collect()
}
