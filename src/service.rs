//! Request-level operations on top of the pipeline and the store.
//!
//! Handlers in `app` only translate HTTP to these calls; everything here
//! is usable (and tested) without a server.

use crate::axes::{AxisSelection, ChartKind, ResolvedAxes, resolve_axes};
use crate::cell::{RowRecord, format_number};
use crate::chart::{ChartDataset, shape_chart};
use crate::error::{Result, VizError};
use crate::graph::{GraphOptions, render_chart_png};
use crate::loader::{extract_columns, extract_rows};
use crate::report::{ExportInput, ExportedDocument, decode_chart_image, export_document};
use crate::saving::{SavedAnalysis, Store, StoredExport, UploadedFile, UserStats};
use crate::summary::{NarrativeSummary, Summary, Synthesizer, TextGenerator, synthesize};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Axis selection plus the file it applies to, as sent by clients.
///
/// Every field is optional on the wire so that missing fields are reported
/// together instead of as a JSON error.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartRequest {
    pub file_id: Option<String>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub z_axis: Option<String>,
    pub chart_type: Option<String>,
    pub chart_title: Option<String>,
}

impl ChartRequest {
    /// Validated selection and file id.
    ///
    /// # Errors
    /// * `VizError::Validation` listing every missing field
    /// * `VizError::UnsupportedChartKind` for an unknown `chartType`
    pub fn validate(&self) -> Result<(String, AxisSelection)> {
        let mut missing = Vec::new();
        let file_id = given(&self.file_id);
        if file_id.is_none() {
            missing.push("fileId".to_string());
        }

        let kind = match given(&self.chart_type) {
            Some(name) => Some(name.parse::<ChartKind>()?),
            None => {
                missing.push("chartType".to_string());
                None
            }
        };

        let selection = match kind {
            Some(kind) => AxisSelection::new(
                self.x_axis.as_deref(),
                self.y_axis.as_deref(),
                self.z_axis.as_deref(),
                kind,
            ),
            None => {
                if given(&self.x_axis).is_none() {
                    missing.push("xAxis".to_string());
                }
                if given(&self.y_axis).is_none() {
                    missing.push("yAxis".to_string());
                }
                Err(VizError::Validation { missing: Vec::new() })
            }
        };

        match (selection, file_id) {
            (Ok(selection), Some(file_id)) => Ok((file_id.to_string(), selection)),
            (Ok(_), None) => Err(VizError::Validation { missing }),
            (Err(VizError::Validation { missing: axes }), _) => {
                missing.extend(axes);
                Err(VizError::Validation { missing })
            }
            (Err(e), _) => Err(e),
        }
    }

    fn title(&self, selection: &AxisSelection) -> String {
        self.chart_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&selection.y_axis)
            .to_string()
    }
}

/// A field's trimmed value, `None` when absent or blank.
fn given(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn axis_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        serde_json::Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

/// Result of chart generation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub title: String,
    pub chart_type: ChartKind,
    pub chart_label: String,
    pub selection: AxisSelection,
    pub dataset: ChartDataset,
    pub rows: Vec<RowRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    #[default]
    Statistical,
    Narrative,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryRequest {
    #[serde(flatten)]
    pub chart: ChartRequest,
    pub mode: SummaryMode,
}

/// A series supplied directly by the caller for a narrative summary.
///
/// `xAxis` labels may be strings, numbers or booleans; `null` reads as `N/A`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeRequest {
    pub title: Option<String>,
    pub chart_type: Option<String>,
    pub x_axis: Option<Vec<serde_json::Value>>,
    pub y_axis_data: Option<Vec<f64>>,
    pub z_axis_data: Option<Vec<f64>>,
}

/// Export parameters. `chartImage` is a data URI or bare base64 image.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportRequest {
    pub title: Option<String>,
    pub chart_image: Option<String>,
    pub summary: Option<String>,
    pub file_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveAnalysisRequest {
    #[serde(flatten)]
    pub chart: ChartRequest,
    pub summary: Option<String>,
}

struct Prepared {
    file: UploadedFile,
    rows: Vec<RowRecord>,
    selection: AxisSelection,
    axes: ResolvedAxes,
    title: String,
}

/// The chart, summary and export service.
pub struct ExcelViz {
    store: Arc<Store>,
    synthesizer: Synthesizer,
}

impl ExcelViz {
    pub fn new(store: Store, generator: Arc<dyn TextGenerator>, summary_timeout: Duration) -> Self {
        ExcelViz {
            store: Arc::new(store),
            synthesizer: Synthesizer::new(generator, summary_timeout),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Stores an uploaded workbook after checking that it can be read.
    ///
    /// # Errors
    /// * `VizError::Format` if the bytes are not a workbook with a sheet
    pub fn upload(&self, user: &str, name: &str, bytes: &[u8]) -> Result<UploadedFile> {
        extract_columns(bytes)?;
        let name = name.trim();
        self.store.save_upload(user, if name.is_empty() { "upload.xlsx" } else { name }, bytes)
    }

    fn load_rows(&self, user: &str, file_id: &str) -> Result<(UploadedFile, Vec<RowRecord>)> {
        let (file, bytes) = self.store.load_upload(user, file_id)?;
        let rows = extract_rows(&bytes)?;
        Ok((file, rows))
    }

    fn prepare(&self, user: &str, request: &ChartRequest) -> Result<Prepared> {
        let (file_id, selection) = request.validate()?;
        let (file, rows) = self.load_rows(user, &file_id)?;
        let axes = resolve_axes(&rows, &selection)?;
        let title = request.title(&selection);
        Ok(Prepared { file, rows, selection, axes, title })
    }

    /// Extracts the file's rows and shapes them for the requested chart.
    pub fn generate_chart(&self, user: &str, request: &ChartRequest) -> Result<ChartResponse> {
        let prepared = self.prepare(user, request)?;
        let kind = prepared.selection.kind;
        let dataset = shape_chart(&prepared.axes, kind);

        info!(
            "user {} generated {} from {} ({} points)",
            user,
            kind,
            prepared.file.name,
            dataset.len()
        );

        Ok(ChartResponse {
            title: prepared.title,
            chart_type: kind,
            chart_label: kind.label().to_string(),
            selection: prepared.selection,
            dataset,
            rows: prepared.rows,
        })
    }

    /// Header names of the file's first sheet.
    pub fn columns(&self, user: &str, file_id: &str) -> Result<Vec<String>> {
        let (_, bytes) = self.store.load_upload(user, file_id)?;
        extract_columns(&bytes)
    }

    /// Statistical summary by default; narrative through the text generator
    /// when `mode` is `narrative`.
    pub async fn generate_summary(&self, user: &str, request: &SummaryRequest) -> Result<Summary> {
        let prepared = self.prepare(user, &request.chart)?;

        match request.mode {
            SummaryMode::Statistical => synthesize(
                &prepared.rows,
                &prepared.axes,
                &prepared.selection,
                Some(&prepared.title),
            )
            .map(Summary::Statistical),
            SummaryMode::Narrative => {
                let z = prepared.axes.z_numbers.as_ref().map(|_| prepared.axes.z_values());
                self.synthesizer
                    .narrate(
                        &prepared.title,
                        prepared.selection.kind.label(),
                        &prepared.axes.x_labels,
                        &prepared.axes.y_values(),
                        z.as_deref(),
                    )
                    .await
                    .map(Summary::Narrative)
            }
        }
    }

    /// Narrative summary of a series supplied by the caller.
    pub async fn narrate(&self, request: &NarrativeRequest) -> Result<NarrativeSummary> {
        let title = request.title.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let chart_type = request.chart_type.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if title.is_none() {
            missing.push("title".to_string());
        }
        if chart_type.is_none() {
            missing.push("chartType".to_string());
        }
        if request.x_axis.is_none() {
            missing.push("xAxis".to_string());
        }
        if request.y_axis_data.is_none() {
            missing.push("yAxisData".to_string());
        }

        match (title, chart_type, &request.x_axis, &request.y_axis_data) {
            (Some(title), Some(chart_type), Some(x), Some(y)) => {
                let labels: Vec<String> = x.iter().map(axis_label).collect();
                self.synthesizer
                    .narrate(title, chart_type, &labels, y, request.z_axis_data.as_deref())
                    .await
            }
            _ => Err(VizError::Validation { missing }),
        }
    }

    /// Builds the PDF report; rows come from the file named by `fileId`.
    pub fn export_document(&self, user: &str, request: &ExportRequest) -> Result<ExportedDocument> {
        let rows = match request.file_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(file_id) => Some(self.load_rows(user, file_id)?.1),
            None => None,
        };
        let image = request.chart_image.as_deref().and_then(decode_chart_image);

        export_document(&ExportInput {
            title: request.title.as_deref(),
            chart_image: image.as_deref(),
            summary: request.summary.as_deref(),
            rows: rows.as_deref(),
        })
    }

    /// Saves a snapshot of the chart for the selection, computed here from
    /// the stored file.
    pub fn save_analysis(&self, user: &str, request: &SaveAnalysisRequest) -> Result<SavedAnalysis> {
        let prepared = self.prepare(user, &request.chart)?;
        let dataset = shape_chart(&prepared.axes, prepared.selection.kind);

        let analysis = SavedAnalysis {
            id: Uuid::new_v4().to_string(),
            file_id: prepared.file.id,
            file_name: prepared.file.name,
            title: prepared.title,
            selection: prepared.selection,
            dataset,
            summary: request
                .summary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            created_at: Utc::now(),
        };
        self.store.save_analysis(user, &analysis)?;
        Ok(analysis)
    }

    pub fn history(&self, user: &str) -> Result<Vec<SavedAnalysis>> {
        self.store.list_analyses(user)
    }

    pub fn analysis(&self, user: &str, id: &str) -> Result<SavedAnalysis> {
        self.store.load_analysis(user, id)
    }

    pub fn delete_analysis(&self, user: &str, id: &str) -> Result<()> {
        self.store.delete_analysis(user, id)
    }

    pub fn stats(&self, user: &str) -> Result<UserStats> {
        self.store.stats(user)
    }

    /// PNG rendering of a saved analysis.
    pub fn analysis_png(&self, user: &str, id: &str) -> Result<Vec<u8>> {
        let analysis = self.store.load_analysis(user, id)?;
        let selection = &analysis.selection;
        let options = GraphOptions {
            title: analysis.title.clone(),
            x_label: selection.x_axis.clone(),
            y_label: selection.z_axis.clone().unwrap_or_else(|| selection.y_axis.clone()),
            ..GraphOptions::default()
        };
        render_chart_png(&analysis.dataset, selection.kind, &options)
    }

    pub fn store_export(
        &self,
        user: &str,
        title: &str,
        chart_kind: &str,
        file_id: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredExport> {
        if bytes.is_empty() {
            return Err(VizError::MissingInput { missing: vec!["file"] });
        }
        self.store.save_export(user, title, chart_kind, file_id, bytes)
    }

    pub fn exports(&self, user: &str) -> Result<Vec<StoredExport>> {
        self.store.list_exports(user)
    }

    pub fn export_blob(&self, user: &str, id: &str) -> Result<(StoredExport, Vec<u8>)> {
        self.store.load_export(user, id)
    }
}
