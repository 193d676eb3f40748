mod common;

use common::{sales_workbook, xlsx};
use excelviz::axes::{
    AxisSelection, ChartKind, MISSING_LABEL, coerce_label_or_placeholder, coerce_numeric_or_zero,
    parse_numeric, resolve_axes,
};
use excelviz::cell::{CellValue, rows_from_strings};
use excelviz::error::VizError;
use excelviz::loader::extract_rows;

fn selection(x: &str, y: &str, z: Option<&str>, kind: ChartKind) -> AxisSelection {
    AxisSelection::new(Some(x), Some(y), z, kind).unwrap()
}

#[test]
fn lenient_numeric_coercion() {
    let text = |s: &str| CellValue::Text(s.to_string());
    assert_eq!(coerce_numeric_or_zero(Some(&text("abc"))), 0.0);
    assert_eq!(coerce_numeric_or_zero(Some(&text("42"))), 42.0);
    assert_eq!(coerce_numeric_or_zero(Some(&text("  3.5kg"))), 3.5);
    assert_eq!(coerce_numeric_or_zero(Some(&text("-1e2"))), -100.0);
    assert_eq!(coerce_numeric_or_zero(Some(&CellValue::Number(7.25))), 7.25);
    assert_eq!(coerce_numeric_or_zero(Some(&CellValue::Bool(true))), 0.0);
    assert_eq!(coerce_numeric_or_zero(Some(&CellValue::Empty)), 0.0);
    assert_eq!(coerce_numeric_or_zero(None), 0.0);
    assert_eq!(parse_numeric(Some(&text("abc"))), None);
    assert_eq!(parse_numeric(Some(&text(".5"))), Some(0.5));
}

#[test]
fn label_placeholder_for_missing_cells() {
    assert_eq!(coerce_label_or_placeholder(None), MISSING_LABEL);
    assert_eq!(coerce_label_or_placeholder(Some(&CellValue::Empty)), "N/A");
    assert_eq!(coerce_label_or_placeholder(Some(&CellValue::Number(3.0))), "3");
    assert_eq!(coerce_label_or_placeholder(Some(&CellValue::Bool(false))), "false");
}

#[test]
fn resolves_workbook_axes_with_policies() {
    let rows = extract_rows(&sales_workbook()).unwrap();
    let axes = resolve_axes(&rows, &selection("Month", "Sales", None, ChartKind::Bar)).unwrap();

    assert_eq!(axes.len(), 6);
    assert_eq!(axes.x_labels[0], "Jan");
    assert_eq!(axes.y_values(), vec![100.0, 150.0, 0.0, 200.0, 42.0, 250.0]);
    assert_eq!(axes.y_numbers[2], None);
    assert!(axes.z_numbers.is_none());
}

#[test]
fn resolution_is_repeatable() {
    let rows = extract_rows(&sales_workbook()).unwrap();
    let sel = selection("Region", "Month", Some("Units"), ChartKind::Bar3D);
    let first = resolve_axes(&rows, &sel).unwrap();
    let second = resolve_axes(&rows, &sel).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.z_values(), vec![10.0, 12.0, 9.0, 15.0, 0.0, 20.0]);
}

#[test]
fn header_only_sheet_is_an_empty_dataset() {
    let rows = extract_rows(&xlsx(&["X", "Y"], &[])).unwrap();
    let err = resolve_axes(&rows, &selection("X", "Y", None, ChartKind::Line)).unwrap_err();
    assert!(matches!(err, VizError::EmptyDataset));
}

#[test]
fn unknown_column_reads_as_missing() {
    let rows = rows_from_strings(&["X", "Y"], &[&["a", "1"], &["b", "2"]]);
    let axes = resolve_axes(&rows, &selection("Nope", "Y", None, ChartKind::Bar)).unwrap();
    assert_eq!(axes.x_labels, vec!["N/A", "N/A"]);
    assert_eq!(axes.y_values(), vec![1.0, 2.0]);
}

#[test]
fn three_d_kinds_require_z() {
    for kind in [ChartKind::Bar3D, ChartKind::Line3D, ChartKind::Pie3D] {
        match AxisSelection::new(Some("X"), Some("Y"), None, kind) {
            Err(VizError::Validation { missing }) => assert_eq!(missing, vec!["zAxis"]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
    assert!(AxisSelection::new(Some("X"), Some("Y"), Some("Z"), ChartKind::Bar3D).is_ok());
}

#[test]
fn missing_axes_are_all_reported() {
    match AxisSelection::new(None, Some("  "), None, ChartKind::Line3D) {
        Err(VizError::Validation { missing }) => {
            assert_eq!(missing, vec!["xAxis", "yAxis", "zAxis"])
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn z_axis_is_dropped_for_flat_kinds() {
    let sel = AxisSelection::new(Some("X"), Some("Y"), Some("Z"), ChartKind::Pie).unwrap();
    assert_eq!(sel.z_axis, None);
}

#[test]
fn chart_kind_parsing() {
    let parse = |s: &str| s.parse::<ChartKind>();
    assert_eq!(parse("Bar Chart").unwrap(), ChartKind::Bar);
    assert_eq!(parse("line").unwrap(), ChartKind::Line);
    assert_eq!(parse("Doughnut Chart").unwrap(), ChartKind::Doughnut);
    assert_eq!(parse("donut").unwrap(), ChartKind::Doughnut);
    assert_eq!(parse("3D Pie Chart").unwrap(), ChartKind::Pie3D);
    assert_eq!(parse("bar3d").unwrap(), ChartKind::Bar3D);
    assert_eq!(parse("3d-line").unwrap(), ChartKind::Line3D);

    let err = parse("radar").unwrap_err();
    assert!(matches!(err, VizError::UnsupportedChartKind(ref k) if k == "radar"));
    assert!(err.is_client_error());

    for kind in ChartKind::ALL {
        assert_eq!(parse(kind.label()).unwrap(), kind);
    }
}
