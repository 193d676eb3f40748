use crate::axes::{AxisSelection, ResolvedAxes, coerce_label_or_placeholder};
use crate::cell::{RowRecord, format_number};
use crate::error::{Result, VizError};
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// How many source rows the statistical summary quotes.
pub const SAMPLE_ROWS: usize = 3;

/// A text-generation backend such as a hosted language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Stand-in used when no text-generation service is configured.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(VizError::SummaryGeneration(
            "text generation service is not configured".to_string(),
        ))
    }
}

/// A value together with the X label of the row it came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extremum {
    pub value: f64,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleRow {
    pub x: String,
    pub y: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<String>,
}

/// Descriptive statistics of the Y axis, plus the same content as prose.
///
/// Statistics cover only the Y cells that parsed as numbers; rows whose Y
/// cell did not parse are left out rather than counted as zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub headline: String,
    pub chart_title: String,
    pub chart_type: String,
    pub x_axis: String,
    pub y_axis: String,
    pub count: usize,
    pub total: f64,
    pub average: f64,
    pub max: Extremum,
    pub min: Extremum,
    /// Change from the first to the last value in percent; `None` when the
    /// first value is zero and the change is undefined.
    pub percent_change: Option<f64>,
    pub sample: Vec<SampleRow>,
    pub text: String,
}

/// Free-form text returned by the text-generation service.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeSummary {
    pub chart_title: String,
    pub text: String,
}

/// Either kind of summary, tagged by `mode` in JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Summary {
    Statistical(SummaryReport),
    Narrative(NarrativeSummary),
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Statistical(report) => &report.text,
            Summary::Narrative(narrative) => &narrative.text,
        }
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the statistical summary of the selected Y axis.
///
/// # Errors
/// * `VizError::NoNumericData` if no Y cell parsed as a number
pub fn synthesize(
    rows: &[RowRecord],
    axes: &ResolvedAxes,
    selection: &AxisSelection,
    chart_title: Option<&str>,
) -> Result<SummaryReport> {
    let points: Vec<(&str, f64)> = axes.parsed_y().collect();

    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.1, last.1),
        _ => {
            return Err(VizError::NoNumericData {
                axis: selection.y_axis.clone(),
            });
        }
    };

    let total: f64 = points.iter().map(|(_, v)| v).sum();
    let average = round2(total / points.len() as f64);

    let mut max = Extremum { value: first, label: points[0].0.to_string() };
    let mut min = max.clone();
    for (label, value) in &points[1..] {
        if *value > max.value {
            max = Extremum { value: *value, label: label.to_string() };
        }
        if *value < min.value {
            min = Extremum { value: *value, label: label.to_string() };
        }
    }

    let percent_change = if first == 0.0 {
        None
    } else {
        Some(round2((last - first) / first * 100.0))
    };

    let sample = rows
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| SampleRow {
            x: coerce_label_or_placeholder(row.get(&selection.x_axis)),
            y: coerce_label_or_placeholder(row.get(&selection.y_axis)),
            z: selection
                .z_axis
                .as_ref()
                .map(|z| coerce_label_or_placeholder(row.get(z))),
        })
        .collect();

    let chart_title = chart_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&selection.y_axis)
        .to_string();

    let mut report = SummaryReport {
        headline: format!(
            "{}: {} of {} by {}",
            chart_title,
            selection.kind.label(),
            selection.y_axis,
            selection.x_axis
        ),
        chart_title,
        chart_type: selection.kind.label().to_string(),
        x_axis: selection.x_axis.clone(),
        y_axis: selection.y_axis.clone(),
        count: points.len(),
        total,
        average,
        max,
        min,
        percent_change,
        sample,
        text: String::new(),
    };
    report.text = render_report(&report, selection.z_axis.as_deref());
    Ok(report)
}

/// Renders a report into the fixed prose form embedded in exports.
pub fn render_report(report: &SummaryReport, z_axis: Option<&str>) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", report.headline);
    let _ = writeln!(
        text,
        "The {} values of \"{}\" across \"{}\" were analysed.",
        report.count, report.y_axis, report.x_axis
    );
    let _ = writeln!(text, "Total: {}", format_number(round2(report.total)));
    let _ = writeln!(text, "Average: {:.2}", report.average);
    let _ = writeln!(
        text,
        "Highest: {} at \"{}\"",
        format_number(report.max.value),
        report.max.label
    );
    let _ = writeln!(
        text,
        "Lowest: {} at \"{}\"",
        format_number(report.min.value),
        report.min.label
    );
    match report.percent_change {
        Some(change) => {
            let _ = writeln!(text, "Change from first to last value: {:.2}%", change);
        }
        None => {
            let _ = writeln!(
                text,
                "Change from first to last value: undefined (first value is 0)"
            );
        }
    }

    if !report.sample.is_empty() {
        let _ = writeln!(text, "Sample rows:");
        for (i, row) in report.sample.iter().enumerate() {
            let _ = write!(
                text,
                "{}. {}: {}, {}: {}",
                i + 1,
                report.x_axis,
                row.x,
                report.y_axis,
                row.y
            );
            if let (Some(z_axis), Some(z)) = (z_axis, &row.z) {
                let _ = write!(text, ", {}: {}", z_axis, z);
            }
            text.push('\n');
        }
    }

    text.trim_end().to_string()
}

/// Builds the prompt sent to the text-generation service.
pub fn narrative_prompt(
    title: &str,
    chart_type: &str,
    x_labels: &[String],
    y_data: &[f64],
    z_data: Option<&[f64]>,
) -> String {
    let join = |values: &[f64]| {
        values
            .iter()
            .map(|v| format_number(*v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut prompt = String::from("You are an expert data analyst. Analyze the following chart:\n");
    let _ = writeln!(prompt, "- Title: {}", title);
    let _ = writeln!(prompt, "- Chart Type: {}", chart_type);
    let _ = writeln!(prompt, "- X-Axis: {}", x_labels.join(", "));
    let _ = writeln!(prompt, "- Y-Axis Data: [{}]", join(y_data));
    if let Some(z) = z_data {
        let _ = writeln!(prompt, "- Z-Axis Data: [{}]", join(z));
    }
    prompt.push_str("\nProvide a concise summary with insights, trends, or patterns.");
    prompt
}

/// Produces narrative summaries through an injected `TextGenerator`.
#[derive(Clone)]
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Synthesizer { generator, timeout }
    }

    /// Asks the generator for a narrative about a series.
    ///
    /// # Errors
    /// * `VizError::SummaryGeneration` if the generator fails, exceeds the
    ///   timeout, or returns only whitespace
    pub async fn narrate(
        &self,
        title: &str,
        chart_type: &str,
        x_labels: &[String],
        y_data: &[f64],
        z_data: Option<&[f64]>,
    ) -> Result<NarrativeSummary> {
        let prompt = narrative_prompt(title, chart_type, x_labels, y_data, z_data);

        let text = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(VizError::SummaryGeneration(msg))) => {
                warn!("text generation failed: {}", msg);
                return Err(VizError::SummaryGeneration(msg));
            }
            Ok(Err(e)) => {
                warn!("text generation failed: {}", e);
                return Err(VizError::SummaryGeneration(e.to_string()));
            }
            Err(_) => {
                warn!("text generation timed out after {:?}", self.timeout);
                return Err(VizError::SummaryGeneration(format!(
                    "timed out after {} ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(VizError::SummaryGeneration(
                "service returned an empty summary".to_string(),
            ));
        }

        info!("narrative summary generated for \"{}\"", title);
        Ok(NarrativeSummary {
            chart_title: title.to_string(),
            text: text.to_string(),
        })
    }
}
