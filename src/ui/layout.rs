//! Figure layout: channel panels in a two-row grid.
//!
//! Each panel is an image on top of its histogram. The histogram is 0.3 of the image
//! height and touches it; rows are separated by 0.2 of a panel height. The top of the
//! figure is reserved for the title.

use egui::{pos2, Rect};

/// Rows in every figure
pub const GRID_ROWS: usize = 2;
/// Histogram height relative to the image height
pub const HISTOGRAM_RATIO: f32 = 0.3;
/// Vertical gap between rows, relative to a panel height
pub const ROW_GAP_RATIO: f32 = 0.2;
/// Share of the figure height used by the title
pub const TITLE_FRACTION: f32 = 0.08;
/// Horizontal gap between columns, in points
pub const COLUMN_GAP: f32 = 12.0;

/// Grid shape for `n` channel panels: always 2 rows, `ceil(n / 2)` columns.
pub fn grid_shape(n: usize) -> (usize, usize) {
    (GRID_ROWS, n.div_ceil(GRID_ROWS))
}

/// Row and column of panel `index`, filling row-major
pub fn cell_of(index: usize, cols: usize) -> (usize, usize) {
    if cols == 0 {
        return (0, 0);
    }
    (index / cols, index % cols)
}

/// Screen areas of one channel panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelRects {
    /// Image sub-panel
    pub image: Rect,
    /// Histogram sub-panel, directly below the image
    pub histogram: Rect,
}

/// Screen areas of a whole figure
#[derive(Debug, Clone, PartialEq)]
pub struct FigureLayout {
    /// Title band
    pub title: Rect,
    /// One entry per channel, in channel order
    pub panels: Vec<PanelRects>,
}

impl FigureLayout {
    /// Lay out `n` channel panels inside `area`.
    pub fn compute(area: Rect, n: usize) -> Self {
        let title_height = area.height() * TITLE_FRACTION;
        let title = Rect::from_min_max(area.min, pos2(area.max.x, area.min.y + title_height));
        let grid = Rect::from_min_max(pos2(area.min.x, title.max.y), area.max);

        let (rows, cols) = grid_shape(n);
        if cols == 0 {
            return Self {
                title,
                panels: Vec::new(),
            };
        }

        // rows * panel + (rows - 1) * gap, where panel = image * (1 + ratio)
        let per_image = rows as f32 * (1.0 + HISTOGRAM_RATIO)
            + (rows - 1) as f32 * ROW_GAP_RATIO * (1.0 + HISTOGRAM_RATIO);
        let image_height = grid.height() / per_image;
        let histogram_height = image_height * HISTOGRAM_RATIO;
        let panel_height = image_height + histogram_height;
        let row_gap = panel_height * ROW_GAP_RATIO;

        let total_gaps = COLUMN_GAP * (cols - 1) as f32;
        let panel_width = ((grid.width() - total_gaps) / cols as f32).max(0.0);

        let panels = (0..n)
            .map(|index| {
                let (row, col) = cell_of(index, cols);
                let left = grid.min.x + col as f32 * (panel_width + COLUMN_GAP);
                let top = grid.min.y + row as f32 * (panel_height + row_gap);
                let image = Rect::from_min_max(
                    pos2(left, top),
                    pos2(left + panel_width, top + image_height),
                );
                let histogram = Rect::from_min_max(
                    pos2(left, image.max.y),
                    pos2(left + panel_width, image.max.y + histogram_height),
                );
                PanelRects { image, histogram }
            })
            .collect();

        Self { title, panels }
    }
}

/// Largest rect with the given aspect ratio (width / height) centred in `outer`
pub fn fit_aspect(outer: Rect, aspect: f32) -> Rect {
    if !(aspect.is_finite() && aspect > 0.0) || outer.height() <= 0.0 {
        return outer;
    }
    let (width, height) = if outer.width() / outer.height() > aspect {
        (outer.height() * aspect, outer.height())
    } else {
        (outer.width(), outer.width() / aspect)
    };
    Rect::from_center_size(outer.center(), egui::vec2(width, height))
}
