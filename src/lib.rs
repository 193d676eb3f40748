/*!
# ExcelViz

Turns uploaded Excel workbooks into chart data, summaries and PDF reports,
served over a small JSON API.

## Overview

A user uploads a workbook, picks columns for the X, Y and (for 3D charts) Z
axes, and gets back chart-ready data. The same selection can be summarised,
either as fixed-form statistics or as a narrative written by a language
model, and exported as a paginated PDF with the chart image, the summary
and an excerpt of the source rows.

## Pipeline

1. **Extraction** (`loader`): the first sheet of the workbook becomes a list
   of `RowRecord`s keyed by the header row.
2. **Axis resolution** (`axes`): the selected columns are pulled out of every
   row. Missing labels become `"N/A"`; unparseable numbers become `0`.
3. **Shaping** (`chart`): resolved axes are turned into a `ChartDataset` for
   the chart kind (categorical series, label distribution or 3D triplets).
4. **Summary** (`summary`): descriptive statistics of the Y axis, or a
   narrative through an injected `TextGenerator`.
5. **Export** (`report`): a pure page layout, then PDF rendering.

## Supported chart kinds

| Kind | Axes | Dataset |
|---|---|---|
| Bar, Line | X, Y | labels + values |
| Pie, Doughnut | X, Y | distinct X labels + counts |
| 3D Bar, 3D Line, 3D Pie | X, Y, Z | x, y, z per row |

## Modules

- **cell**: cell values and row records
- **loader**: workbook parsing with calamine
- **axes**: chart kinds, axis selection and coercion policies
- **chart**: dataset shaping per chart kind
- **summary**: statistical and narrative summaries
- **report**: PDF layout and rendering
- **graph**: server-side PNG rendering of datasets
- **saving**: per-user storage of uploads, analyses and exports
- **service**: request-level operations
- **config**: environment configuration
- **error**: the crate error type
- **app**: routing and handlers (feature `web`)
- **openai**: chat-completions text generator (feature `web`)

## REST API Endpoints

All routes expect the `x-user-id` header.

- `POST /api/upload`, `GET /api/upload/user`, `GET /api/upload/recent-files`
- `GET /api/upload/file/:id`, `GET /api/upload/columns/:file_id`, `DELETE /api/upload/:id`
- `POST /api/analysis/generate`, `POST /api/analysis/summary`, `POST /api/analysis/save`
- `GET /api/analysis/history`, `GET /api/analysis/user-stats`
- `GET|DELETE /api/analysis/:id`, `GET /api/analysis/:id/chart.png`
- `POST /api/ai/generate-summary`
- `POST /api/export/pdf`, `POST|GET /api/export/saved`, `GET /api/export/saved/:id`
*/

pub mod axes;
pub mod cell;
pub mod chart;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod report;
pub mod saving;
pub mod service;
pub mod summary;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod openai;

pub use axes::{AxisSelection, ChartKind, ResolvedAxes, resolve_axes};
pub use cell::{CellValue, RowRecord};
pub use chart::{ChartDataset, shape_chart};
pub use error::{Result, VizError};
pub use loader::{extract_columns, extract_rows};
pub use report::{ExportInput, ExportedDocument, export_document};
pub use service::ExcelViz;
pub use summary::{Summary, SummaryReport, Synthesizer, TextGenerator, synthesize};
