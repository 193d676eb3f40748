//! Error types for the chart and report pipeline.
//!
//! Every failure a request can end with has its own variant so callers can
//! tell them apart without matching on message text.

/// All errors produced by extraction, charting, summaries, export and storage.
#[derive(Debug, thiserror::Error)]
pub enum VizError {
    /// The buffer is not a readable workbook, or it has no sheets.
    #[error("Unreadable spreadsheet: {0}")]
    Format(String),

    /// The first sheet has a header row but no data rows.
    #[error("Spreadsheet contains no data rows")]
    EmptyDataset,

    /// Required axis fields are missing for the requested chart kind.
    #[error("Missing required field(s): {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    /// The chart kind named by the caller is not one we can draw.
    #[error("Unsupported chart type: {0}")]
    UnsupportedChartKind(String),

    /// No Y value could be read as a number.
    #[error("Column \"{axis}\" has no numeric values")]
    NoNumericData { axis: String },

    /// The text-generation service failed, timed out or answered badly.
    #[error("Failed to generate summary: {0}")]
    SummaryGeneration(String),

    /// Export was requested without one of its required inputs.
    #[error("Missing export input(s): {}", .missing.join(", "))]
    MissingInput { missing: Vec<&'static str> },

    /// The request body could not be read as the expected JSON or form.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The request body is larger than the configured upload limit.
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Drawing a chart image or a PDF page failed.
    #[error("Render error: {0}")]
    Render(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VizError>;

impl VizError {
    /// Stable machine-readable name for the error, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            VizError::Format(_) => "format_error",
            VizError::EmptyDataset => "empty_dataset",
            VizError::Validation { .. } => "validation_error",
            VizError::UnsupportedChartKind(_) => "unsupported_chart_kind",
            VizError::NoNumericData { .. } => "no_numeric_data",
            VizError::SummaryGeneration(_) => "summary_generation_error",
            VizError::MissingInput { .. } => "missing_input",
            VizError::InvalidBody(_) => "invalid_body",
            VizError::PayloadTooLarge(_) => "payload_too_large",
            VizError::NotFound(_) => "not_found",
            VizError::Unauthorized(_) => "unauthorized",
            VizError::Storage(_) => "storage_error",
            VizError::Encoding(_) => "encoding_error",
            VizError::Render(_) => "render_error",
        }
    }

    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VizError::Format(_)
                | VizError::EmptyDataset
                | VizError::Validation { .. }
                | VizError::UnsupportedChartKind(_)
                | VizError::NoNumericData { .. }
                | VizError::MissingInput { .. }
                | VizError::InvalidBody(_)
                | VizError::PayloadTooLarge(_)
        )
    }
}

impl From<bincode::Error> for VizError {
    fn from(e: bincode::Error) -> Self {
        VizError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for VizError {
    fn from(e: serde_json::Error) -> Self {
        VizError::Encoding(e.to_string())
    }
}

impl From<calamine::Error> for VizError {
    fn from(e: calamine::Error) -> Self {
        VizError::Format(e.to_string())
    }
}
