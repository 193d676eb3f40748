use crate::cell::{CellValue, RowRecord};
use crate::error::{Result, VizError};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    // Leading numeric prefix, so "12.5kg" reads as 12.5 like a spreadsheet import would
    static ref NUMERIC_PREFIX: Regex =
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap();
}

/// Label used for a categorical cell that is missing.
pub const MISSING_LABEL: &str = "N/A";

/// Chart types the application can produce
///
/// The kind decides which axes are required and which dataset shape the
/// chart shaper returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
    Bar3D,
    Line3D,
    Pie3D,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Doughnut,
        ChartKind::Bar3D,
        ChartKind::Line3D,
        ChartKind::Pie3D,
    ];

    /// 3D kinds need a Z axis.
    pub fn is_3d(self) -> bool {
        match self {
            ChartKind::Bar3D | ChartKind::Line3D | ChartKind::Pie3D => true,
            ChartKind::Bar | ChartKind::Line | ChartKind::Pie | ChartKind::Doughnut => false,
        }
    }

    /// The label shown in the UI and in generated reports.
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar Chart",
            ChartKind::Line => "Line Chart",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Doughnut => "Doughnut Chart",
            ChartKind::Bar3D => "3D Bar Chart",
            ChartKind::Line3D => "3D Line Chart",
            ChartKind::Pie3D => "3D Pie Chart",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartKind {
    type Err = VizError;

    /// Accepts the UI labels ("3D Bar Chart") and short forms ("bar3d", "3d-bar").
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .to_lowercase()
            .replace("chart", "")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "bar" | "column" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            "doughnut" | "donut" => Ok(ChartKind::Doughnut),
            "bar3d" | "3dbar" => Ok(ChartKind::Bar3D),
            "line3d" | "3dline" => Ok(ChartKind::Line3D),
            "pie3d" | "3dpie" => Ok(ChartKind::Pie3D),
            _ => Err(VizError::UnsupportedChartKind(s.to_string())),
        }
    }
}

/// The caller's choice of columns for one chart request.
///
/// Only constructed through `AxisSelection::new`, so a value of this type
/// always has the axes its chart kind needs. `z_axis` is `Some` exactly when
/// the kind is 3D.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisSelection {
    pub x_axis: String,
    pub y_axis: String,
    pub z_axis: Option<String>,
    pub kind: ChartKind,
}

impl AxisSelection {
    /// Validates the requested axes against the chart kind.
    ///
    /// X and Y are required for every kind, Z only for 3D kinds. Blank names
    /// count as missing. A Z axis sent with a 2D kind is dropped.
    ///
    /// # Errors
    /// * `VizError::Validation` listing every missing field
    pub fn new(
        x_axis: Option<&str>,
        y_axis: Option<&str>,
        z_axis: Option<&str>,
        kind: ChartKind,
    ) -> Result<Self> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        let x = present(x_axis);
        let y = present(y_axis);
        let z = present(z_axis);

        let mut missing = Vec::new();
        if x.is_none() {
            missing.push("xAxis".to_string());
        }
        if y.is_none() {
            missing.push("yAxis".to_string());
        }
        if kind.is_3d() && z.is_none() {
            missing.push("zAxis".to_string());
        }

        match (x, y) {
            (Some(x_axis), Some(y_axis)) if missing.is_empty() => Ok(AxisSelection {
                x_axis,
                y_axis,
                z_axis: if kind.is_3d() { z } else { None },
                kind,
            }),
            _ => Err(VizError::Validation { missing }),
        }
    }
}

/// Per-row axis values pulled out of the rows, in row order.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAxes {
    /// X values through the label policy.
    pub x_labels: Vec<String>,
    /// Y values through the label policy, used where Y is categorical (3D).
    pub y_labels: Vec<String>,
    /// Y values that parsed as numbers, `None` where parsing failed.
    pub y_numbers: Vec<Option<f64>>,
    /// Z values that parsed as numbers; present only for 3D selections.
    pub z_numbers: Option<Vec<Option<f64>>>,
}

impl ResolvedAxes {
    pub fn len(&self) -> usize {
        self.x_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_labels.is_empty()
    }

    /// Y values with unparseable cells replaced by zero.
    pub fn y_values(&self) -> Vec<f64> {
        self.y_numbers.iter().map(|v| v.unwrap_or(0.0)).collect()
    }

    /// Z values with unparseable cells replaced by zero.
    pub fn z_values(&self) -> Vec<f64> {
        self.z_numbers
            .as_ref()
            .map(|z| z.iter().map(|v| v.unwrap_or(0.0)).collect())
            .unwrap_or_default()
    }

    /// `(x label, y value)` pairs for rows whose Y cell parsed as a number.
    pub fn parsed_y(&self) -> impl Iterator<Item = (&str, f64)> {
        self.x_labels
            .iter()
            .zip(self.y_numbers.iter())
            .filter_map(|(label, y)| y.map(|v| (label.as_str(), v)))
    }
}

/// Pulls the selected axes out of every row.
///
/// Missing categorical cells become `"N/A"` and malformed numeric cells
/// become zero; neither is an error. A column name that is not in the header
/// is handled the same way (every cell counts as missing) and logged.
///
/// # Errors
/// * `VizError::EmptyDataset` if `rows` is empty
pub fn resolve_axes(rows: &[RowRecord], selection: &AxisSelection) -> Result<ResolvedAxes> {
    let first = rows.first().ok_or(VizError::EmptyDataset)?;

    let mut wanted = vec![&selection.x_axis, &selection.y_axis];
    wanted.extend(selection.z_axis.as_ref());
    for column in wanted {
        if !first.has_column(column) {
            warn!("column \"{}\" is not in the sheet header; treating it as empty", column);
        }
    }

    let x_labels = rows
        .iter()
        .map(|r| coerce_label_or_placeholder(r.get(&selection.x_axis)))
        .collect();
    let y_labels = rows
        .iter()
        .map(|r| coerce_label_or_placeholder(r.get(&selection.y_axis)))
        .collect();
    let y_numbers = rows.iter().map(|r| parse_numeric(r.get(&selection.y_axis))).collect();
    let z_numbers = selection
        .z_axis
        .as_ref()
        .map(|z| rows.iter().map(|r| parse_numeric(r.get(z))).collect());

    Ok(ResolvedAxes {
        x_labels,
        y_labels,
        y_numbers,
        z_numbers,
    })
}

/// Reads a cell as a number, or `None` when it is not one.
///
/// Text is read by its leading numeric prefix after leading whitespace.
/// Booleans, blanks and non-finite results are not numbers.
pub fn parse_numeric(cell: Option<&CellValue>) -> Option<f64> {
    match cell? {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => NUMERIC_PREFIX
            .find(s.trim_start())
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Numeric policy: a cell that does not parse counts as zero.
pub fn coerce_numeric_or_zero(cell: Option<&CellValue>) -> f64 {
    parse_numeric(cell).unwrap_or(0.0)
}

/// Label policy: a missing or blank cell is shown as `"N/A"`.
pub fn coerce_label_or_placeholder(cell: Option<&CellValue>) -> String {
    match cell {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => MISSING_LABEL.to_string(),
    }
}
