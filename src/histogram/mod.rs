//! Histogram plot rendering
//!
//! Renders the three channel histograms of one capture as a line plot with
//! axes, tick labels, a legend and a title. Every render starts from a fresh
//! canvas, so the renderer can be called once per capture with no carried-over
//! plot state.

pub mod glyphs;

use crate::errors::ColometryError;
use crate::types::{CHANNEL_NAMES, HISTOGRAM_BINS};
use glyphs::{draw_text, put_clipped, text_width, GLYPH_HEIGHT};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const CHANNEL_COLORS: [Rgb<u8>; 3] = [Rgb([214, 39, 40]), Rgb([44, 160, 44]), Rgb([31, 119, 180])];

const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 60;

/// Renders per-capture histogram plots.
#[derive(Debug, Clone, Copy)]
pub struct HistogramRenderer {
    width: u32,
    height: u32,
}

impl Default for HistogramRenderer {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Pixel rectangle of the plotting area.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl PlotArea {
    fn x_for(&self, intensity: usize) -> i64 {
        self.left + (intensity as i64 * (self.right - self.left)) / (HISTOGRAM_BINS as i64 - 1)
    }

    fn y_for(&self, count: u32, max_count: u32) -> i64 {
        let span = self.bottom - self.top;
        self.bottom - (count as i64 * span) / max_count.max(1) as i64
    }
}

impl HistogramRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self, ColometryError> {
        if width <= MARGIN_LEFT + MARGIN_RIGHT + 64 || height <= MARGIN_TOP + MARGIN_BOTTOM + 64 {
            return Err(ColometryError::InvalidArgument(format!(
                "histogram canvas {}x{} is too small",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render the plot for capture `capture_index`.
    pub fn render(&self, histograms: &[Vec<u32>; 3], capture_index: u32) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let area = PlotArea {
            left: MARGIN_LEFT as i64,
            top: MARGIN_TOP as i64,
            right: (self.width - MARGIN_RIGHT) as i64,
            bottom: (self.height - MARGIN_BOTTOM) as i64,
        };

        let max_count = histograms
            .iter()
            .flat_map(|h| h.iter().copied())
            .max()
            .unwrap_or(0)
            .max(1);

        self.draw_grid_and_axes(&mut canvas, &area, max_count);

        for (histogram, color) in histograms.iter().zip(CHANNEL_COLORS) {
            let mut previous: Option<(i64, i64)> = None;
            for (intensity, &count) in histogram.iter().enumerate().take(HISTOGRAM_BINS) {
                let point = (area.x_for(intensity), area.y_for(count, max_count));
                if let Some(from) = previous {
                    draw_line(&mut canvas, from, point, color);
                }
                previous = Some(point);
            }
        }

        self.draw_legend(&mut canvas, &area);
        self.draw_labels(&mut canvas, &area, capture_index);
        canvas
    }

    /// Render and write a PNG to `path`.
    pub fn render_to_file(
        &self,
        histograms: &[Vec<u32>; 3],
        capture_index: u32,
        path: &Path,
    ) -> Result<PathBuf, ColometryError> {
        let plot = self.render(histograms, capture_index);
        plot.save_with_format(path, ImageFormat::Png)?;
        log::debug!("Histogram for capture {} written to {:?}", capture_index, path);
        Ok(path.to_path_buf())
    }

    fn draw_grid_and_axes(&self, canvas: &mut RgbImage, area: &PlotArea, max_count: u32) {
        for intensity in (0..HISTOGRAM_BINS).step_by(50) {
            let x = area.x_for(intensity);
            draw_line(canvas, (x, area.top), (x, area.bottom), GRID);
            draw_line(canvas, (x, area.bottom), (x, area.bottom + 5), AXIS);

            let label = intensity.to_string();
            let label_x = x - text_width(&label, 1) as i64 / 2;
            draw_text(canvas, label_x, area.bottom + 9, &label, 1, AXIS);
        }

        for step in 0..=4u32 {
            let count = (max_count as u64 * step as u64 / 4) as u32;
            let y = area.y_for(count, max_count);
            draw_line(canvas, (area.left, y), (area.right, y), GRID);
            draw_line(canvas, (area.left - 5, y), (area.left, y), AXIS);

            let label = count.to_string();
            let label_x = area.left - 9 - text_width(&label, 1) as i64;
            draw_text(canvas, label_x, y - GLYPH_HEIGHT as i64 / 2, &label, 1, AXIS);
        }

        draw_line(canvas, (area.left, area.top), (area.left, area.bottom), AXIS);
        draw_line(canvas, (area.left, area.bottom), (area.right, area.bottom), AXIS);
    }

    fn draw_legend(&self, canvas: &mut RgbImage, area: &PlotArea) {
        let row_height = 16i64;
        let label_width = text_width("R channel", 1) as i64;
        let box_width = 28 + label_width + 10;
        let box_height = row_height * 3 + 8;
        let left = area.right - box_width - 8;
        let top = area.top + 8;

        for y in top..top + box_height {
            for x in left..left + box_width {
                put_clipped(canvas, x, y, BACKGROUND);
            }
        }
        draw_rect(canvas, left, top, box_width, box_height, AXIS);

        for (row, (name, color)) in CHANNEL_NAMES.iter().zip(CHANNEL_COLORS).enumerate() {
            let y = top + 4 + row as i64 * row_height + row_height / 2;
            draw_line(canvas, (left + 6, y), (left + 22, y), color);
            draw_line(canvas, (left + 6, y + 1), (left + 22, y + 1), color);
            let label = format!("{} channel", name);
            draw_text(canvas, left + 28, y - GLYPH_HEIGHT as i64 / 2, &label, 1, AXIS);
        }
    }

    fn draw_labels(&self, canvas: &mut RgbImage, area: &PlotArea, capture_index: u32) {
        let title = format!("RGB Histogram - Capture {}", capture_index);
        let title_x = (self.width as i64 - text_width(&title, 2) as i64) / 2;
        draw_text(canvas, title_x, 16, &title, 2, AXIS);

        let x_label = "Pixel Intensity";
        let x_label_x = (area.left + area.right - text_width(x_label, 2) as i64) / 2;
        draw_text(canvas, x_label_x, area.bottom + 28, x_label, 2, AXIS);

        draw_text(canvas, 8, area.top - 14, "Pixel Count", 1, AXIS);
    }
}

/// Bresenham line, clipped to the canvas.
fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_clipped(canvas, x, y, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_rect(canvas: &mut RgbImage, left: i64, top: i64, width: i64, height: i64, color: Rgb<u8>) {
    let right = left + width - 1;
    let bottom = top + height - 1;
    draw_line(canvas, (left, top), (right, top), color);
    draw_line(canvas, (left, bottom), (right, bottom), color);
    draw_line(canvas, (left, top), (left, bottom), color);
    draw_line(canvas, (right, top), (right, bottom), color);
}
