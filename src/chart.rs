use crate::axes::{ChartKind, ResolvedAxes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chart data ready for rendering, shaped for one chart kind.
///
/// Colors and other styling are left to whoever draws the chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartDataset {
    /// One label and one value per row (bar and line charts).
    Categorical2D { labels: Vec<String>, values: Vec<f64> },

    /// Distinct X labels with how many rows carry each (pie and doughnut).
    Distribution { labels: Vec<String>, counts: Vec<u64> },

    /// One point per row; X and Y are labels, Z is numeric (3D charts).
    Triplet3D {
        x: Vec<String>,
        y: Vec<String>,
        z: Vec<f64>,
    },
}

impl ChartDataset {
    /// Number of points (rows for 2D and 3D, distinct labels for distributions).
    pub fn len(&self) -> usize {
        match self {
            ChartDataset::Categorical2D { labels, .. } => labels.len(),
            ChartDataset::Distribution { labels, .. } => labels.len(),
            ChartDataset::Triplet3D { x, .. } => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the dataset for `kind` from resolved axes.
///
/// - Bar, Line: labels and zero-filled Y values, one entry per row.
/// - Pie, Doughnut: distinct X labels in first-seen order with row counts.
/// - 3D kinds: X and Y labels as read, zero-filled Z values, one entry per row.
pub fn shape_chart(axes: &ResolvedAxes, kind: ChartKind) -> ChartDataset {
    match kind {
        ChartKind::Bar | ChartKind::Line => ChartDataset::Categorical2D {
            labels: axes.x_labels.clone(),
            values: axes.y_values(),
        },
        ChartKind::Pie | ChartKind::Doughnut => {
            let (labels, counts) = count_labels(&axes.x_labels);
            ChartDataset::Distribution { labels, counts }
        }
        ChartKind::Bar3D | ChartKind::Line3D | ChartKind::Pie3D => ChartDataset::Triplet3D {
            x: axes.x_labels.clone(),
            y: axes.y_labels.clone(),
            z: axes.z_values(),
        },
    }
}

/// Frequency count that keeps labels in the order they first appear.
fn count_labels(labels: &[String]) -> (Vec<String>, Vec<u64>) {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut distinct = Vec::new();
    let mut counts: Vec<u64> = Vec::new();

    for label in labels {
        match index.get(label.as_str()) {
            Some(&i) => counts[i] += 1,
            None => {
                index.insert(label, distinct.len());
                distinct.push(label.clone());
                counts.push(1);
            }
        }
    }

    (distinct, counts)
}
