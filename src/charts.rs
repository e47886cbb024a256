//! Chart rendering for prediction summaries.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use plotters::prelude::*;
use plotters::style::FontStyle;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::PathBuf;

use crate::engine::ChurnLabel;
use crate::report::PredictionSummary;

const CHART_SIZE: (u32, u32) = (800, 500);
const FONT_FAMILY: &str = "sans-serif";
const LINE_COLOR: RGBColor = RGBColor(128, 0, 128);
const BAR_INSET: f64 = 0.2;

/// PNG bytes for the two summary charts.
#[derive(Debug, Clone)]
pub struct Charts {
    pub bar_graph: Vec<u8>,
    pub line_graph: Vec<u8>,
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, summary: &PredictionSummary) -> Result<Charts>;
}

pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Registers the first loadable font under the family the charts draw with.
/// Returns the path that was used, if any. Call once at startup.
pub fn register_font(candidates: &[PathBuf]) -> Option<PathBuf> {
    for path in candidates {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Font not readable");
                continue;
            }
        };
        // plotters keeps registered fonts for the life of the process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Registered chart font");
                return Some(path.clone());
            }
            Err(_) => tracing::warn!(path = %path.display(), "Invalid font file"),
        }
    }
    None
}

/// Draws the charts into in-memory bitmaps with plotters.
#[derive(Debug, Clone)]
pub struct PlottersRenderer {
    with_text: bool,
}

impl PlottersRenderer {
    /// `with_text` requires a font registered through [`register_font`].
    pub fn new(with_text: bool) -> Self {
        Self { with_text }
    }

    /// Registers a font from `candidates` and enables text if that worked.
    pub fn with_font_candidates(candidates: &[PathBuf]) -> Self {
        let font = register_font(candidates);
        if font.is_none() {
            tracing::warn!("No chart font found, charts will be rendered without text");
        }
        Self::new(font.is_some())
    }

    pub fn draws_text(&self) -> bool {
        self.with_text
    }

    fn render_bar(&self, summary: &PredictionSummary) -> Result<Vec<u8>> {
        let shares = summary.shares();
        // one unit-wide slot per bar
        let slots = shares.len().max(1) as f64;
        let (width, height) = CHART_SIZE;
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;

            let mut builder = ChartBuilder::on(&root);
            builder.margin(20).x_label_area_size(40).y_label_area_size(60);
            if self.with_text {
                builder.caption("Churn Predictions (Percentage)", (FONT_FAMILY, 24));
            }
            let mut chart = builder.build_cartesian_2d(0f64..slots, 0f64..110f64)?;

            if self.with_text {
                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .x_labels(0)
                    .x_desc("Prediction")
                    .y_desc("Percentage")
                    .axis_desc_style((FONT_FAMILY, 15))
                    .draw()?;
            }

            chart.draw_series(shares.iter().enumerate().map(|(i, &(label, pct))| {
                let color = match label {
                    ChurnLabel::Churn => RED,
                    ChurnLabel::NoChurn => BLUE,
                };
                let x = i as f64;
                Rectangle::new([(x + BAR_INSET, 0.0), (x + 1.0 - BAR_INSET, pct)], color.filled())
            }))?;

            if self.with_text {
                let style = TextStyle::from((FONT_FAMILY, 16).into_font())
                    .pos(Pos::new(HPos::Center, VPos::Bottom));
                chart.draw_series(shares.iter().enumerate().map(|(i, &(_, pct))| {
                    Text::new(format!("{pct:.2}%"), (i as f64 + 0.5, pct + 1.0), style.clone())
                }))?;

                // Bar names go under the axis, outside the plotting area.
                let name_style = TextStyle::from((FONT_FAMILY, 14).into_font())
                    .pos(Pos::new(HPos::Center, VPos::Top));
                for (i, (label, _)) in shares.iter().enumerate() {
                    let (x, y) = chart.backend_coord(&(i as f64 + 0.5, 0.0));
                    root.draw(&Text::new(label.as_str(), (x, y + 6), name_style.clone()))?;
                }
            }

            root.present()?;
        }
        encode_png(&buffer, CHART_SIZE)
    }

    fn render_line(&self, summary: &PredictionSummary) -> Result<Vec<u8>> {
        let points: Vec<(f64, f64)> = summary
            .cumulative_churn
            .iter()
            .enumerate()
            .map(|(i, &count)| (i as f64, count as f64))
            .collect();
        let x_max = points.len().saturating_sub(1).max(1) as f64;
        let y_max = summary.churn.max(1) as f64 * 1.1;

        let (width, height) = CHART_SIZE;
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;

            let mut builder = ChartBuilder::on(&root);
            builder.margin(20).x_label_area_size(40).y_label_area_size(60);
            if self.with_text {
                builder.caption("Cumulative Churn Predictions", (FONT_FAMILY, 24));
            }
            let mut chart = builder.build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

            if self.with_text {
                chart
                    .configure_mesh()
                    .x_desc("Index")
                    .y_desc("Cumulative Count")
                    .axis_desc_style((FONT_FAMILY, 15))
                    .draw()?;
            }

            chart.draw_series(LineSeries::new(points.iter().copied(), LINE_COLOR.stroke_width(2)))?;
            chart.draw_series(
                points
                    .iter()
                    .map(|&point| Circle::new(point, 3, LINE_COLOR.filled())),
            )?;

            root.present()?;
        }
        encode_png(&buffer, CHART_SIZE)
    }
}

impl ChartRenderer for PlottersRenderer {
    #[tracing::instrument(skip_all, fields(rows = summary.total()))]
    fn render(&self, summary: &PredictionSummary) -> Result<Charts> {
        Ok(Charts {
            bar_graph: self.render_bar(summary).context("rendering bar chart")?,
            line_graph: self.render_line(summary).context("rendering line chart")?,
        })
    }
}

fn encode_png(rgb: &[u8], (width, height): (u32, u32)) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(rgb, width, height, ExtendedColorType::Rgb8)
        .context("encoding chart as PNG")?;
    Ok(png)
}
