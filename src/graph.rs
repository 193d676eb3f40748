use crate::axes::ChartKind;
use crate::chart::ChartDataset;
use crate::error::{Result, VizError};
use image::{ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;

/// Palette cycled through for bars and slices.
const PALETTE: [RGBColor; 8] = [
    RGBColor(0, 119, 182),
    RGBColor(255, 159, 64),
    RGBColor(75, 192, 192),
    RGBColor(255, 99, 132),
    RGBColor(153, 102, 255),
    RGBColor(255, 205, 86),
    RGBColor(54, 162, 235),
    RGBColor(201, 203, 207),
];

/// Fraction of the pie radius left empty in a doughnut.
const DOUGHNUT_HOLE: f64 = 0.5;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Styling for a rendered chart image.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Renders a shaped dataset to PNG bytes.
///
/// Bar and line kinds draw on category axes. Pie and doughnut kinds draw
/// slices sized by row count. 3D kinds are flattened to a bar or line over
/// their X labels and Z values; 3D pie draws slices sized by Z.
///
/// # Arguments
/// * `dataset` - Output of `shape_chart` for `kind`
/// * `kind` - Chart kind the dataset was shaped for
/// * `options` - Title, axis labels and image size
///
/// # Returns
/// * PNG image bytes
///
/// # Errors
/// * `VizError::Render` if a drawing step or the PNG encoding fails
pub fn render_chart_png(dataset: &ChartDataset, kind: ChartKind, options: &GraphOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width.max(1), options.height.max(1));
    let mut pixels = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        match dataset {
            ChartDataset::Categorical2D { labels, values } => match kind {
                ChartKind::Line => draw_line(&root, labels, values, options)?,
                _ => draw_bars(&root, labels, values, options)?,
            },
            ChartDataset::Distribution { labels, counts } => {
                let sizes: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
                let hole = if kind == ChartKind::Doughnut { DOUGHNUT_HOLE } else { 0.0 };
                draw_pie(&root, labels, &sizes, hole, options)?;
            }
            ChartDataset::Triplet3D { x, z, .. } => match kind {
                ChartKind::Line3D => draw_line(&root, x, z, options)?,
                ChartKind::Pie3D => {
                    let sizes: Vec<f64> = z.iter().map(|v| v.max(0.0)).collect();
                    draw_pie(&root, x, &sizes, 0.0, options)?;
                }
                _ => draw_bars(&root, x, z, options)?,
            },
        }

        root.present().map_err(render_err)?;
    }

    encode_png(pixels, width, height)
}

fn render_err<E: std::fmt::Display>(e: E) -> VizError {
    VizError::Render(e.to_string())
}

fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| VizError::Render("pixel buffer has the wrong size".to_string()))?;
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).map_err(render_err)?;
    Ok(out.into_inner())
}

/// Y range that always includes zero, padded so bars do not touch the frame.
fn value_range(values: &[f64]) -> (f64, f64) {
    let lo = values.iter().copied().fold(0.0_f64, f64::min);
    let hi = values.iter().copied().fold(0.0_f64, f64::max);
    if hi - lo < f64::EPSILON {
        return (lo, lo + 1.0);
    }
    let pad = (hi - lo) * 0.1;
    (if lo < 0.0 { lo - pad } else { lo }, hi + pad)
}

fn category_label(labels: &[String], x: f64) -> String {
    let i = x.floor();
    if i < 0.0 || (x - i - 0.5).abs() > 0.25 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

fn draw_bars(root: &Area<'_>, labels: &[String], values: &[f64], options: &GraphOptions) -> Result<()> {
    let (lo, hi) = value_range(values);
    let n = labels.len().max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..n as f64, lo..hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n * 2 + 1)
        .x_label_formatter(&|x| category_label(labels, *x))
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *v)],
                PALETTE[i % PALETTE.len()].filled(),
            )
        }))
        .map_err(render_err)?;

    Ok(())
}

fn draw_line(root: &Area<'_>, labels: &[String], values: &[f64], options: &GraphOptions) -> Result<()> {
    let (lo, hi) = value_range(values);
    let n = labels.len().max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..n as f64, lo..hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(n * 2 + 1)
        .x_label_formatter(&|x| category_label(labels, *x))
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()
        .map_err(render_err)?;

    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64 + 0.5, *v))
        .collect();

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &PALETTE[0]))
        .map_err(render_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(*p, 3, PALETTE[0].filled())))
        .map_err(render_err)?;

    Ok(())
}

/// Slices proportional to `sizes`, starting at twelve o'clock. A non-zero
/// `hole` cuts out the centre as a fraction of the radius.
fn draw_pie(root: &Area<'_>, labels: &[String], sizes: &[f64], hole: f64, options: &GraphOptions) -> Result<()> {
    let (width, height) = root.dim_in_pixel();
    root.draw(&Text::new(
        options.title.clone(),
        (10, 10),
        ("sans-serif", 30).into_font(),
    ))
    .map_err(render_err)?;

    let total: f64 = sizes.iter().sum();
    if total <= 0.0 {
        return Ok(());
    }

    let legend_width = (width / 4) as i32;
    let center = (((width as i32) - legend_width) / 2, (height as i32) / 2 + 20);
    let radius = ((width as i32 - legend_width).min(height as i32 - 60) as f64 / 2.0 - 20.0).max(10.0);

    let mut start = -90.0;
    for (i, size) in sizes.iter().enumerate() {
        let sweep = size / total * 360.0;
        if sweep > 0.0 {
            let color = PALETTE[i % PALETTE.len()];
            draw_slice(root, center, radius, start, sweep, color)?;
        }
        start += sweep;
    }

    if hole > 0.0 {
        root.draw(&Circle::new(center, (radius * hole) as i32, WHITE.filled()))
            .map_err(render_err)?;
    }

    // Legend
    let legend_x = width as i32 - legend_width;
    for (i, label) in labels.iter().enumerate() {
        let y = 60 + i as i32 * 22;
        if y > height as i32 - 20 {
            break;
        }
        root.draw(&Rectangle::new(
            [(legend_x, y), (legend_x + 14, y + 14)],
            PALETTE[i % PALETTE.len()].filled(),
        ))
        .map_err(render_err)?;
        root.draw(&Text::new(
            label.clone(),
            (legend_x + 20, y),
            ("sans-serif", 14).into_font(),
        ))
        .map_err(render_err)?;
    }

    Ok(())
}

fn draw_slice(
    root: &Area<'_>,
    center: (i32, i32),
    radius: f64,
    start_angle: f64,
    sweep_angle: f64,
    color: RGBColor,
) -> Result<()> {
    let steps = ((sweep_angle / 2.0).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);

    for i in 0..=steps {
        let angle = (start_angle + sweep_angle * i as f64 / steps as f64).to_radians();
        points.push((
            center.0 + (radius * angle.cos()) as i32,
            center.1 + (radius * angle.sin()) as i32,
        ));
    }

    root.draw(&Polygon::new(points, color.filled()))
        .map_err(render_err)?;
    Ok(())
}
