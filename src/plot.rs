//! Bar-chart rendering of a prepared enrichment table.
//!
//! One bar per cell type, height `abs_deviation`, with a text marker above
//! every significant bar. A `direction` column splits each cell type into
//! side-by-side coloured bars with a legend; a `list_name` column splits
//! the drawing area into one panel per result list. The q-values were
//! already computed jointly over the whole table, panels only subset the
//! rows for display.

use std::collections::HashMap;
use std::fs::File;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_backend::FontTransform;
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::polars_err;

/// Appearance knobs for [`plot_enrichment`]. Loadable from a JSON file so
/// runs can share a plot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    /// Caption for panels without a list name. Panels with one use the
    /// list name itself.
    pub caption: Option<String>,
    /// Glyph drawn above significant bars.
    pub marker: String,
    /// Direction label to RGB override, consulted before the built-in
    /// palette.
    pub direction_colors: HashMap<String, [u8; 3]>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            width: 900,
            height: 650,
            caption: None,
            marker: "*".to_string(),
            direction_colors: HashMap::new(),
        }
    }
}

impl PlotOptions {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

struct BarRow {
    cell_type: String,
    direction: Option<String>,
    abs_deviation: f64,
    label_y_offset: f64,
    significant: bool,
}

const DIRECTION_PALETTE: [RGBColor; 6] = [
    RGBColor(230, 25, 75),  // red
    RGBColor(0, 130, 200),  // blue
    RGBColor(60, 180, 75),  // green
    RGBColor(245, 130, 48), // orange
    RGBColor(145, 30, 180), // purple
    RGBColor(70, 240, 240), // cyan
];

fn colour_for_direction(options: &PlotOptions, direction: &str, idx: usize) -> RGBColor {
    if let Some([r, g, b]) = options.direction_colors.get(direction) {
        return RGBColor(*r, *g, *b);
    }
    match direction {
        "Up" | "up" | "increased" => RGBColor(230, 25, 75),
        "Down" | "down" | "decreased" => RGBColor(0, 130, 200),
        // Single-direction tables get a neutral steel blue.
        "" => RGBColor(70, 130, 180),
        _ => DIRECTION_PALETTE[idx % DIRECTION_PALETTE.len()],
    }
}

/// Render the prepared table to `output_path`. A `.svg` extension selects
/// the SVG backend, anything else goes through the bitmap backend.
pub fn plot_enrichment(
    df: &DataFrame,
    options: &PlotOptions,
    output_path: &str,
) -> PolarsResult<()> {
    let facets = facet_rows(df)?;
    if facets.is_empty() {
        return Err(PolarsError::ComputeError("no rows to plot".into()));
    }

    if output_path.ends_with(".svg") {
        let root =
            SVGBackend::new(output_path, (options.width, options.height)).into_drawing_area();
        render(&root, &facets, options)?;
        root.present().map_err(|e| polars_err(Box::new(e)))?;
    } else {
        let root =
            BitMapBackend::new(output_path, (options.width, options.height)).into_drawing_area();
        render(&root, &facets, options)?;
        root.present().map_err(|e| polars_err(Box::new(e)))?;
    }

    info!("Enrichment chart saved to {}", output_path);
    Ok(())
}

/// Extract the plotting rows, grouped by `list_name` in first-appearance
/// order. Tables without a `list_name` column yield a single unnamed
/// facet.
fn facet_rows(df: &DataFrame) -> PolarsResult<Vec<(String, Vec<BarRow>)>> {
    let has_column =
        |name: &str| df.get_column_names().iter().any(|c| c.as_str() == name);

    let cell_type = df.column("cell_type")?.str()?.clone();
    let abs_deviation = df.column("abs_deviation")?.f64()?.clone();
    let label_y_offset = df.column("label_y_offset")?.f64()?.clone();
    let is_significant = df.column("is_significant")?.bool()?.clone();
    let direction = if has_column("direction") {
        Some(df.column("direction")?.str()?.clone())
    } else {
        None
    };
    let list_name = if has_column("list_name") {
        Some(df.column("list_name")?.str()?.clone())
    } else {
        None
    };

    let mut facets: Vec<(String, Vec<BarRow>)> = Vec::new();
    for i in 0..df.height() {
        let (cell, dev, offset) = match (
            cell_type.get(i),
            abs_deviation.get(i),
            label_y_offset.get(i),
        ) {
            (Some(c), Some(d), Some(o)) => (c, d, o),
            _ => {
                warn!("Skipping row {} with missing cell type or deviation", i);
                continue;
            }
        };

        let row = BarRow {
            cell_type: cell.to_string(),
            direction: direction
                .as_ref()
                .and_then(|d| d.get(i))
                .map(|d| d.to_string()),
            abs_deviation: dev,
            label_y_offset: offset,
            significant: is_significant.get(i).unwrap_or(false),
        };

        let key = list_name
            .as_ref()
            .and_then(|l| l.get(i))
            .unwrap_or("")
            .to_string();
        match facets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => facets.push((key, vec![row])),
        }
    }

    Ok(facets)
}

fn render<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    facets: &[(String, Vec<BarRow>)],
    options: &PlotOptions,
) -> PolarsResult<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let panels = root.split_evenly((facets.len(), 1));
    for (panel, (list_name, rows)) in panels.iter().zip(facets.iter()) {
        draw_panel(panel, list_name, rows, options)?;
    }

    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    list_name: &str,
    rows: &[BarRow],
    options: &PlotOptions,
) -> PolarsResult<()>
where
    DB::ErrorType: 'static,
{
    // Cell types and directions in order of appearance.
    let mut cells: Vec<&str> = Vec::new();
    for row in rows {
        if !cells.contains(&row.cell_type.as_str()) {
            cells.push(&row.cell_type);
        }
    }
    let mut directions: Vec<&str> = Vec::new();
    for row in rows {
        let dir = row.direction.as_deref().unwrap_or("");
        if !directions.contains(&dir) {
            directions.push(dir);
        }
    }

    let y_max = rows
        .iter()
        .map(|r| r.abs_deviation.max(r.label_y_offset))
        .fold(0.0_f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };

    let n = cells.len();
    let caption = if list_name.is_empty() {
        options
            .caption
            .clone()
            .unwrap_or_else(|| "Cell-type enrichment".to_string())
    } else {
        list_name.to_string()
    };

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .caption(caption, ("sans-serif", 20))
        .x_label_area_size(100)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5_f64..(n as f64 - 0.5), 0.0..y_max)
        .map_err(|e| polars_err(Box::new(e)))?;

    let label_for_tick = |x: &f64| -> String {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        cells
            .get(i as usize)
            .map(|c| c.to_string())
            .unwrap_or_default()
    };

    // Cell-type names run vertically under their bars.
    let x_label_style = TextStyle::from(("sans-serif", 14).into_font())
        .transform(FontTransform::Rotate270);

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .x_label_formatter(&label_for_tick)
        .x_desc("Cell type")
        .y_desc("|SD from mean|")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .x_label_style(x_label_style)
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    let group_width = 0.8_f64;
    let bar_width = group_width / directions.len() as f64;

    for (d_idx, dir) in directions.iter().enumerate() {
        let colour = colour_for_direction(options, dir, d_idx);

        let bars: Vec<Rectangle<(f64, f64)>> = rows
            .iter()
            .filter(|r| r.direction.as_deref().unwrap_or("") == *dir)
            .map(|r| {
                let ci = cells
                    .iter()
                    .position(|c| *c == r.cell_type.as_str())
                    .unwrap_or(0);
                let x0 = ci as f64 - group_width / 2.0 + d_idx as f64 * bar_width;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, r.abs_deviation)], colour.filled())
            })
            .collect();

        let series = chart
            .draw_series(bars)
            .map_err(|e| polars_err(Box::new(e)))?;

        if directions.len() > 1 {
            let label = if dir.is_empty() { "unspecified" } else { dir };
            series.label(label).legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], colour.filled())
            });
        }
    }

    // Significance markers sit at the precomputed label offset, pulled
    // into the axis range for zero-height bars.
    let marker_style = TextStyle::from(("sans-serif", 22).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    for row in rows.iter().filter(|r| r.significant) {
        let ci = cells
            .iter()
            .position(|c| *c == row.cell_type.as_str())
            .unwrap_or(0);
        let d_idx = directions
            .iter()
            .position(|d| *d == row.direction.as_deref().unwrap_or(""))
            .unwrap_or(0);
        let x = ci as f64 - group_width / 2.0 + (d_idx as f64 + 0.5) * bar_width;
        let y = row.label_y_offset.max(0.0).min(y_max * 0.95);

        chart
            .draw_series(std::iter::once(Text::new(
                options.marker.clone(),
                (x, y),
                marker_style.clone(),
            )))
            .map_err(|e| polars_err(Box::new(e)))?;
    }

    if directions.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(|e| polars_err(Box::new(e)))?;
    }

    Ok(())
}
