//! Saturation histogram painter
//!
//! Draws a [`HistogramBins`] as log-scaled bars:
//! - x-axis fixed to `[0, max * 1.05]` so the saturation value always sits near the right edge
//! - no y ticks, only the bars and a baseline
//! - `"<pct>% sat"` annotation right/top aligned at x = max

use egui::{Align2, Color32, FontId, Painter, Rect, Stroke};

use crate::analysis::HistogramBins;
use crate::render::ChannelView;

const BAR_COLOR: Color32 = Color32::from_rgb(90, 90, 90);
const BACKGROUND: Color32 = Color32::from_rgb(250, 250, 250);
const AXIS_COLOR: Color32 = Color32::from_rgb(60, 60, 60);
const SATURATION_COLOR: Color32 = Color32::from_rgb(200, 30, 30);

/// Height of a bar relative to the tallest, on a log scale. Empty bins are 0.
pub fn log_fraction(count: u32, max_count: u32) -> f32 {
    if count == 0 || max_count == 0 {
        return 0.0;
    }
    let max_value = (f64::from(max_count) + 1.0).ln();
    ((f64::from(count) + 1.0).ln() / max_value) as f32
}

/// Screen x of data value `value` on an axis spanning `[0, x_max]`
pub fn x_to_screen(value: f64, x_max: f64, rect: Rect) -> f32 {
    if x_max <= 0.0 {
        return rect.left();
    }
    rect.left() + (value / x_max) as f32 * rect.width()
}

/// One channel's histogram
pub struct SaturationHistogram<'a> {
    bins: &'a HistogramBins,
    saturation_max: f64,
    x_max: f64,
    annotation: String,
}

impl<'a> SaturationHistogram<'a> {
    /// Histogram for one channel panel
    pub fn new(view: &'a ChannelView) -> Self {
        Self {
            bins: &view.histogram,
            saturation_max: f64::from(view.saturation_max),
            x_max: view.histogram_x_max(),
            annotation: view.saturation_text(),
        }
    }

    /// Paint into `rect`
    pub fn paint(&self, painter: &Painter, rect: Rect) {
        let painter = painter.with_clip_rect(rect);
        painter.rect_filled(rect, 0.0, BACKGROUND);

        let max_count = self.bins.max_count();
        let plot_height = rect.height() - 2.0;
        for (i, &count) in self.bins.counts.iter().enumerate() {
            let fraction = log_fraction(count, max_count);
            if fraction <= 0.0 {
                continue;
            }
            let start = self.bins.bin_start(i);
            let x0 = x_to_screen(start, self.x_max, rect);
            let x1 = x_to_screen(start + self.bins.bin_width(), self.x_max, rect);
            if x0 > rect.right() {
                continue;
            }
            let bar_height = fraction * plot_height;
            let bar = Rect::from_min_max(
                egui::pos2(x0, rect.bottom() - bar_height),
                egui::pos2(x1.max(x0 + 1.0), rect.bottom()),
            );
            painter.rect_filled(bar, 0.0, BAR_COLOR);
        }

        painter.line_segment(
            [rect.left_bottom(), rect.right_bottom()],
            Stroke::new(1.0, AXIS_COLOR),
        );

        let sat_x = x_to_screen(self.saturation_max, self.x_max, rect);
        painter.line_segment(
            [egui::pos2(sat_x, rect.top()), egui::pos2(sat_x, rect.bottom())],
            Stroke::new(1.0, SATURATION_COLOR.gamma_multiply(0.5)),
        );
        painter.text(
            egui::pos2(sat_x - 2.0, rect.top() + 2.0),
            Align2::RIGHT_TOP,
            &self.annotation,
            FontId::proportional(12.0),
            SATURATION_COLOR,
        );
        painter.text(
            rect.left_bottom() + egui::vec2(2.0, -2.0),
            Align2::LEFT_BOTTOM,
            "0",
            FontId::proportional(10.0),
            AXIS_COLOR,
        );
    }
}
