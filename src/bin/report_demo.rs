#![cfg(not(tarpaulin_include))]

use excelviz::axes::{AxisSelection, ChartKind, resolve_axes};
use excelviz::cell::rows_from_strings;
use excelviz::chart::shape_chart;
use excelviz::graph::{GraphOptions, render_chart_png};
use excelviz::report::{ExportInput, export_document};
use excelviz::summary::synthesize;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Writes a sample chart image and PDF report into `report_output/`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rows = rows_from_strings(
        &["Month", "Revenue", "Region"],
        &[
            &["Jan", "1200", "North"],
            &["Feb", "1350", "North"],
            &["Mar", "980", "South"],
            &["Apr", "1610", "East"],
            &["May", "", "South"],
            &["Jun", "1725.5", "West"],
            &["Jul", "1490", "North"],
            &["Aug", "1880", "East"],
            &["Sep", "1760", "West"],
            &["Oct", "1930", "South"],
            &["Nov", "2050", "North"],
            &["Dec", "2400", "East"],
        ],
    );

    let selection = AxisSelection::new(Some("Month"), Some("Revenue"), None, ChartKind::Bar)?;
    let axes = resolve_axes(&rows, &selection)?;
    let dataset = shape_chart(&axes, selection.kind);
    let report = synthesize(&rows, &axes, &selection, Some("Monthly Revenue"))?;

    let out_dir = Path::new("report_output");
    fs::create_dir_all(out_dir)?;

    let options = GraphOptions {
        title: report.chart_title.clone(),
        x_label: selection.x_axis.clone(),
        y_label: selection.y_axis.clone(),
        ..GraphOptions::default()
    };
    let png = match render_chart_png(&dataset, selection.kind, &options) {
        Ok(png) => {
            fs::write(out_dir.join("monthly_revenue.png"), &png)?;
            Some(png)
        }
        Err(e) => {
            warn!("chart image not rendered: {}", e);
            None
        }
    };

    let document = export_document(&ExportInput {
        title: Some(&report.chart_title),
        chart_image: png.as_deref(),
        summary: Some(&report.text),
        rows: Some(&rows),
    })?;
    let pdf_path = out_dir.join(&document.filename);
    fs::write(&pdf_path, &document.bytes)?;

    info!(
        "wrote {} ({} page(s))",
        pdf_path.display(),
        document.layout.page_count()
    );
    Ok(())
}
