//! Document exporter.
//!
//! Export runs in two steps. `layout_document` is pure: it places every
//! element on A4 pages and returns a `DocumentLayout`. `render_pdf` then
//! draws that layout with printpdf. Keeping the layout as data means page
//! breaks, section order and table truncation can be checked without
//! parsing PDF output, and identical inputs always give identical layouts.

use crate::cell::RowRecord;
use crate::error::{Result, VizError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, GenericImageView};
use lazy_static::lazy_static;
use log::{info, warn};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect,
};
use regex::Regex;

lazy_static! {
    static ref DATA_URI: Regex = Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,").unwrap();
}

// Page geometry, in millimetres (A4 portrait)
pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
const FRAME_INSET: f32 = 8.0;
const MARGIN: f32 = 15.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN;

const HEADER_HEIGHT: f32 = 22.0;
const SECTION_GAP: f32 = 8.0;
const HEADING_HEIGHT: f32 = 9.0;
const HEADING_SIZE: f32 = 14.0;

pub const CHART_BOX_WIDTH: f32 = CONTENT_WIDTH;
pub const CHART_BOX_HEIGHT: f32 = 110.0;
const PLACEHOLDER_HEIGHT: f32 = 30.0;
pub const CHART_PLACEHOLDER: &str = "Chart image unavailable";

const SUMMARY_SIZE: f32 = 11.0;
const SUMMARY_LINE_HEIGHT: f32 = 5.5;

/// Rows of source data quoted in the table section.
pub const TABLE_MAX_ROWS: usize = 10;
const TABLE_SIZE: f32 = 9.0;
pub const TABLE_ROW_HEIGHT: f32 = 8.0;
const CELL_PADDING: f32 = 1.5;

// Average Helvetica glyph width as a fraction of the font size
const CHAR_WIDTH_EM: f32 = 0.5;
const BOLD_CHAR_WIDTH_EM: f32 = 0.56;
const PT_TO_MM: f32 = 0.352_778;

pub const BRAND_NAME: &str = "ExcelViz";
const BRAND: Rgb = Rgb(0, 119, 182);
const INK: Rgb = Rgb(33, 37, 41);
const WHITE: Rgb = Rgb(255, 255, 255);
const WARNING: Rgb = Rgb(200, 120, 0);
const ROW_SHADE: Rgb = Rgb(235, 242, 250);

// printpdf still writes a random XMP instance id, so bytes differ per run
const DOCUMENT_ID: &str = "excelviz-chart-report";

/// A colour in 8-bit RGB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// The parts of a report, in the order they are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Header,
    Chart,
    Summary,
    Table,
}

/// One drawing instruction. Coordinates are millimetres from the top-left
/// corner of the page; text `y` is the baseline.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// Border around the page, emitted first on every page.
    Frame,
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Rgb,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Rgb,
        text: String,
    },
    /// The chart image, already scaled into its box.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Drawn instead of the chart when no usable image was supplied.
    Placeholder {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        message: String,
    },
    TableRow {
        y: f32,
        header: bool,
        shaded: bool,
        column_width: f32,
        cells: Vec<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
}

/// Every page of a report with its drawing instructions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
    /// Sections in layout order with the page each one starts on.
    pub sections: Vec<(Section, usize)>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn section_order(&self) -> Vec<Section> {
        self.sections.iter().map(|(s, _)| *s).collect()
    }

    /// `(header rows, data rows)` drawn in the table section.
    pub fn table_rows(&self) -> (usize, usize) {
        self.ops()
            .filter_map(|op| match op {
                DrawOp::TableRow { header, .. } => Some(*header),
                _ => None,
            })
            .fold((0, 0), |(h, d), header| if header { (h + 1, d) } else { (h, d + 1) })
    }

    pub fn has_placeholder(&self) -> bool {
        self.ops().any(|op| matches!(op, DrawOp::Placeholder { .. }))
    }

    pub fn has_image(&self) -> bool {
        self.ops().any(|op| matches!(op, DrawOp::Image { .. }))
    }

    fn ops(&self) -> impl Iterator<Item = &DrawOp> {
        self.pages.iter().flat_map(|p| p.ops.iter())
    }
}

/// Inputs to an export. `None` means the caller did not supply the field.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportInput<'a> {
    pub title: Option<&'a str>,
    /// Encoded image bytes (PNG, JPEG, ...). `None` renders a placeholder.
    pub chart_image: Option<&'a [u8]>,
    pub summary: Option<&'a str>,
    pub rows: Option<&'a [RowRecord]>,
}

/// A finished export.
#[derive(Clone, Debug)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub layout: DocumentLayout,
}

/// Builds the PDF report for a chart.
///
/// Title, summary and rows are required; they are checked before anything
/// is drawn. A missing or undecodable chart image is not an error: the
/// chart section shows a warning box instead. An empty `rows` slice is
/// allowed and skips the table section.
///
/// # Errors
/// * `VizError::MissingInput` naming every absent required input
/// * `VizError::Render` if PDF generation fails
pub fn export_document(input: &ExportInput<'_>) -> Result<ExportedDocument> {
    let title = input.title.map(str::trim).filter(|t| !t.is_empty());
    let summary = input.summary.map(str::trim).filter(|s| !s.is_empty());

    let mut missing = Vec::new();
    if title.is_none() {
        missing.push("title");
    }
    if summary.is_none() {
        missing.push("summary");
    }
    if input.rows.is_none() {
        missing.push("rows");
    }
    let (Some(title), Some(summary), Some(rows), true) = (title, summary, input.rows, missing.is_empty())
    else {
        return Err(VizError::MissingInput { missing });
    };

    let image = input.chart_image.and_then(|bytes| match image::load_from_memory(bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("chart image could not be decoded, using placeholder: {}", e);
            None
        }
    });

    let layout = layout_document(title, image.as_ref().map(|img| img.dimensions()), summary, rows);
    let bytes = render_pdf(&layout, title, image.as_ref())?;

    info!(
        "exported \"{}\": {} page(s), {} bytes",
        title,
        layout.page_count(),
        bytes.len()
    );

    Ok(ExportedDocument {
        filename: suggested_filename(Some(title)),
        bytes,
        layout,
    })
}

/// `<title>.pdf` with characters unsafe in a header or file name replaced;
/// `chart.pdf` when the title is absent or nothing is left.
pub fn suggested_filename(title: Option<&str>) -> String {
    let cleaned: String = title
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        "chart.pdf".to_string()
    } else {
        format!("{}.pdf", cleaned)
    }
}

/// Decodes a chart image sent as a `data:image/...;base64,` URI or as bare
/// base64. Returns `None` when the text is not valid base64.
pub fn decode_chart_image(encoded: &str) -> Option<Vec<u8>> {
    let trimmed = encoded.trim();
    let payload = DATA_URI.find(trimmed).map_or(trimmed, |m| &trimmed[m.end()..]);
    match BASE64.decode(payload) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            warn!("chart image is not valid base64: {}", e);
            None
        }
    }
}

/// Places header, chart, summary and table on pages.
///
/// `image_size` is the pixel size of the decoded chart image, or `None` for
/// the placeholder.
pub fn layout_document(
    title: &str,
    image_size: Option<(u32, u32)>,
    summary: &str,
    rows: &[RowRecord],
) -> DocumentLayout {
    let mut builder = LayoutBuilder::default();
    builder.new_page();

    builder.header(title);
    builder.chart(image_size);
    builder.summary(summary);
    if !rows.is_empty() {
        builder.table(rows);
    }

    builder.finish()
}

#[derive(Default)]
struct LayoutBuilder {
    layout: DocumentLayout,
    cursor: f32,
}

impl LayoutBuilder {
    fn new_page(&mut self) {
        self.layout.pages.push(PageLayout { ops: vec![DrawOp::Frame] });
        self.cursor = MARGIN;
    }

    fn remaining(&self) -> f32 {
        CONTENT_BOTTOM - self.cursor
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.remaining() < needed {
            self.new_page();
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.layout.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn mark(&mut self, section: Section) {
        let page = self.layout.pages.len().saturating_sub(1);
        self.layout.sections.push((section, page));
    }

    fn heading(&mut self, text: String) {
        self.push(DrawOp::Text {
            x: MARGIN,
            y: self.cursor + 6.0,
            size: HEADING_SIZE,
            bold: true,
            color: BRAND,
            text,
        });
        self.cursor += HEADING_HEIGHT;
    }

    fn header(&mut self, title: &str) {
        self.mark(Section::Header);
        let top = self.cursor;

        // Logo badge
        self.push(DrawOp::Rect { x: MARGIN, y: top, width: 14.0, height: 14.0, fill: BRAND });
        self.push(DrawOp::Text {
            x: MARGIN + 2.6,
            y: top + 9.4,
            size: 12.0,
            bold: true,
            color: WHITE,
            text: "EV".to_string(),
        });
        self.push(DrawOp::Text {
            x: MARGIN + 18.0,
            y: top + 5.0,
            size: 9.0,
            bold: true,
            color: BRAND,
            text: BRAND_NAME.to_string(),
        });

        let title_width = CONTENT_WIDTH - 18.0;
        self.push(DrawOp::Text {
            x: MARGIN + 18.0,
            y: top + 12.5,
            size: 16.0,
            bold: true,
            color: INK,
            text: fit_text(title, max_chars(16.0, title_width, true)),
        });
        self.push(DrawOp::Rect {
            x: MARGIN,
            y: top + 17.0,
            width: CONTENT_WIDTH,
            height: 0.6,
            fill: BRAND,
        });

        self.cursor = top + HEADER_HEIGHT;
    }

    fn chart(&mut self, image_size: Option<(u32, u32)>) {
        self.mark(Section::Chart);

        match image_size.filter(|(w, h)| *w > 0 && *h > 0) {
            Some((w, h)) => {
                let (width, height) = fit_within(w, h, CHART_BOX_WIDTH, CHART_BOX_HEIGHT);
                self.push(DrawOp::Image {
                    x: MARGIN + (CONTENT_WIDTH - width) / 2.0,
                    y: self.cursor,
                    width,
                    height,
                });
                self.cursor += height + SECTION_GAP;
            }
            None => {
                self.push(DrawOp::Placeholder {
                    x: MARGIN,
                    y: self.cursor,
                    width: CONTENT_WIDTH,
                    height: PLACEHOLDER_HEIGHT,
                    message: CHART_PLACEHOLDER.to_string(),
                });
                self.cursor += PLACEHOLDER_HEIGHT + SECTION_GAP;
            }
        }
    }

    fn summary(&mut self, summary: &str) {
        self.ensure_space(HEADING_HEIGHT + SUMMARY_LINE_HEIGHT);
        self.mark(Section::Summary);
        self.heading("Summary".to_string());

        for line in wrap_text(summary, max_chars(SUMMARY_SIZE, CONTENT_WIDTH, false)) {
            if self.remaining() < SUMMARY_LINE_HEIGHT {
                self.new_page();
            }
            if !line.is_empty() {
                self.push(DrawOp::Text {
                    x: MARGIN,
                    y: self.cursor + 4.0,
                    size: SUMMARY_SIZE,
                    bold: false,
                    color: INK,
                    text: line,
                });
            }
            self.cursor += SUMMARY_LINE_HEIGHT;
        }
        self.cursor += SECTION_GAP;
    }

    fn table(&mut self, rows: &[RowRecord]) {
        let columns = rows.first().map(|r| r.columns().to_vec()).unwrap_or_default();
        if columns.is_empty() {
            return;
        }
        let column_width = CONTENT_WIDTH / columns.len() as f32;
        let cell_chars = max_chars(TABLE_SIZE, column_width - 2.0 * CELL_PADDING, false);
        let shown = rows.len().min(TABLE_MAX_ROWS);

        self.ensure_space(HEADING_HEIGHT + 2.0 * TABLE_ROW_HEIGHT);
        self.mark(Section::Table);
        self.heading(format!("Data Preview ({} of {} rows)", shown, rows.len()));

        self.push(DrawOp::TableRow {
            y: self.cursor,
            header: true,
            shaded: false,
            column_width,
            cells: columns.iter().map(|c| fit_text(c, cell_chars)).collect(),
        });
        self.cursor += TABLE_ROW_HEIGHT;

        for (i, row) in rows.iter().take(TABLE_MAX_ROWS).enumerate() {
            if self.remaining() < TABLE_ROW_HEIGHT {
                self.new_page();
            }
            self.push(DrawOp::TableRow {
                y: self.cursor,
                header: false,
                shaded: i % 2 == 1,
                column_width,
                cells: row.values().iter().map(|v| fit_text(&v.to_string(), cell_chars)).collect(),
            });
            self.cursor += TABLE_ROW_HEIGHT;
        }
    }

    fn finish(self) -> DocumentLayout {
        self.layout
    }
}

/// Scales a `w` x `h` pixel image to the largest size inside the box that
/// keeps its aspect ratio.
pub fn fit_within(w: u32, h: u32, box_width: f32, box_height: f32) -> (f32, f32) {
    let scale = (box_width / w as f32).min(box_height / h as f32);
    (w as f32 * scale, h as f32 * scale)
}

/// How many average-width characters fit in `width` millimetres.
fn max_chars(font_size: f32, width: f32, bold: bool) -> usize {
    let em = if bold { BOLD_CHAR_WIDTH_EM } else { CHAR_WIDTH_EM };
    let char_width = font_size * PT_TO_MM * em;
    ((width / char_width).floor() as usize).max(1)
}

/// Shortens `text` to at most `max` characters, ending in "..." when cut.
pub fn fit_text(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut cut: String = text.chars().take(max - 3).collect();
    cut.push_str("...");
    cut
}

/// Greedy word wrap to lines of at most `width` characters.
///
/// Line breaks in the input are kept; blank input lines stay blank. Words
/// longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();

            while chars.len() > width {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = chars.split_off(width);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }

            let word_len = chars.len();
            if word_len == 0 {
                continue;
            }
            if line_len > 0 && line_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(chars);
            line_len += word_len;
        }

        lines.push(line);
    }

    lines
}

/// Replaces characters the builtin fonts cannot show with `?`.
///
/// The builtin Helvetica faces only cover the WinAnsi set: Latin-1 plus a
/// few punctuation marks and letters from the 0x80-0x9F block.
pub fn winansi_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{a0}'..='\u{ff}' => c,
            '€' | '‚' | 'ƒ' | '„' | '…' | '†' | '‡' | 'ˆ' | '‰' | 'Š' | '‹' | 'Œ' | 'Ž' | '‘'
            | '’' | '“' | '”' | '•' | '–' | '—' | '˜' | '™' | 'š' | '›' | 'œ' | 'ž' | 'Ÿ' => c,
            _ => '?',
        })
        .collect()
}

fn pdf_color(c: Rgb) -> printpdf::Color {
    printpdf::Color::Rgb(printpdf::Rgb::new(
        c.0 as f32 / 255.0,
        c.1 as f32 / 255.0,
        c.2 as f32 / 255.0,
        None,
    ))
}

/// Lower-left and upper-right corners in PDF space for a top-down box.
fn pdf_rect(x: f32, y: f32, width: f32, height: f32, mode: PaintMode) -> Rect {
    Rect::new(
        Mm(x),
        Mm(PAGE_HEIGHT - y - height),
        Mm(x + width),
        Mm(PAGE_HEIGHT - y),
    )
    .with_mode(mode)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Draws a layout into PDF bytes.
///
/// # Errors
/// * `VizError::Render` if a font cannot be added or the document cannot be
///   serialised
pub fn render_pdf(layout: &DocumentLayout, title: &str, image: Option<&DynamicImage>) -> Result<Vec<u8>> {
    let epoch = time::OffsetDateTime::UNIX_EPOCH;
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let doc = doc
        .with_document_id(DOCUMENT_ID.to_string())
        .with_creation_date(epoch)
        .with_mod_date(epoch);

    let render_err = |e: printpdf::Error| VizError::Render(e.to_string());
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?,
    };
    // Images carry no alpha channel in the PDF
    let image = image.map(|img| DynamicImage::ImageRgb8(img.to_rgb8()));

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page_index).get_layer(layer_index)
        };

        for op in &page.ops {
            draw_op(&layer, op, &fonts, image.as_ref());
        }
    }

    doc.save_to_bytes().map_err(render_err)
}

fn draw_op(layer: &PdfLayerReference, op: &DrawOp, fonts: &Fonts, image: Option<&DynamicImage>) {
    match op {
        DrawOp::Frame => {
            layer.set_outline_color(pdf_color(BRAND));
            layer.set_outline_thickness(0.8);
            layer.add_rect(pdf_rect(
                FRAME_INSET,
                FRAME_INSET,
                PAGE_WIDTH - 2.0 * FRAME_INSET,
                PAGE_HEIGHT - 2.0 * FRAME_INSET,
                PaintMode::Stroke,
            ));
        }
        DrawOp::Rect { x, y, width, height, fill } => {
            layer.set_fill_color(pdf_color(*fill));
            layer.add_rect(pdf_rect(*x, *y, *width, *height, PaintMode::Fill));
        }
        DrawOp::Text { x, y, size, bold, color, text } => {
            layer.set_fill_color(pdf_color(*color));
            let font = if *bold { &fonts.bold } else { &fonts.regular };
            layer.use_text(winansi_text(text), *size, Mm(*x), Mm(PAGE_HEIGHT - y), font);
        }
        DrawOp::Image { x, y, width, height } => {
            if let Some(img) = image {
                let (px_width, _) = img.dimensions();
                let dpi = px_width as f32 * 25.4 / width;
                Image::from_dynamic_image(img).add_to_layer(
                    layer.clone(),
                    ImageTransform {
                        translate_x: Some(Mm(*x)),
                        translate_y: Some(Mm(PAGE_HEIGHT - y - height)),
                        dpi: Some(dpi),
                        ..Default::default()
                    },
                );
            }
        }
        DrawOp::Placeholder { x, y, width, height, message } => {
            layer.set_outline_color(pdf_color(WARNING));
            layer.set_outline_thickness(0.6);
            layer.add_rect(pdf_rect(*x, *y, *width, *height, PaintMode::Stroke));
            layer.set_fill_color(pdf_color(WARNING));
            layer.use_text(
                winansi_text(&format!("Warning: {}", message)),
                12.0,
                Mm(x + 6.0),
                Mm(PAGE_HEIGHT - (y + height / 2.0 + 1.5)),
                &fonts.bold,
            );
        }
        DrawOp::TableRow { y, header, shaded, column_width, cells } => {
            let row_width = column_width * cells.len() as f32;
            if *header || *shaded {
                layer.set_fill_color(pdf_color(if *header { BRAND } else { ROW_SHADE }));
                layer.add_rect(pdf_rect(MARGIN, *y, row_width, TABLE_ROW_HEIGHT, PaintMode::Fill));
            }

            layer.set_outline_color(pdf_color(INK));
            layer.set_outline_thickness(0.2);
            let (font, color) = if *header { (&fonts.bold, WHITE) } else { (&fonts.regular, INK) };
            for (i, cell) in cells.iter().enumerate() {
                let cell_x = MARGIN + column_width * i as f32;
                layer.add_rect(pdf_rect(cell_x, *y, *column_width, TABLE_ROW_HEIGHT, PaintMode::Stroke));
                layer.set_fill_color(pdf_color(color));
                layer.use_text(
                    winansi_text(cell),
                    TABLE_SIZE,
                    Mm(cell_x + CELL_PADDING),
                    Mm(PAGE_HEIGHT - (y + TABLE_ROW_HEIGHT - 2.6)),
                    font,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_lines_within_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_splits_long_words_and_keeps_blank_lines() {
        let lines = wrap_text("abcdefghij\n\nxy", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "", "xy"]);
    }

    #[test]
    fn fit_text_ellipsizes() {
        assert_eq!(fit_text("short", 10), "short");
        assert_eq!(fit_text("a long header name", 8), "a lon...");
        assert_eq!(fit_text("abcdef", 2), "ab");
    }

    #[test]
    fn winansi_text_replaces_unsupported_characters() {
        assert_eq!(winansi_text("Ventes été — 5 €"), "Ventes été — 5 €");
        assert_eq!(winansi_text("売上 📈 up"), "?? ? up");
        assert_eq!(winansi_text("tab\there"), "tab?here");
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        let (w, h) = fit_within(1600, 800, 180.0, 110.0);
        assert!((w - 180.0).abs() < 1e-3);
        assert!((h - 90.0).abs() < 1e-3);

        let (w, h) = fit_within(500, 1000, 180.0, 110.0);
        assert!((h - 110.0).abs() < 1e-3);
        assert!((w - 55.0).abs() < 1e-3);
    }

    #[test]
    fn filename_is_sanitized() {
        assert_eq!(suggested_filename(Some("Q1 Sales")), "Q1 Sales.pdf");
        assert_eq!(suggested_filename(Some("a/b\"c")), "a_b_c.pdf");
        assert_eq!(suggested_filename(Some("  ")), "chart.pdf");
        assert_eq!(suggested_filename(None), "chart.pdf");
    }

    #[test]
    fn decodes_data_uri_and_bare_base64() {
        assert_eq!(decode_chart_image("data:image/png;base64,aGVsbG8="), Some(b"hello".to_vec()));
        assert_eq!(decode_chart_image("aGVsbG8="), Some(b"hello".to_vec()));
        assert_eq!(decode_chart_image("not base64!"), None);
    }
}
