//! Frame rendering model
//!
//! [`FrameView`] is everything needed to draw one figure: a title and, per channel,
//! a display-ready RGBA image with the saturated region outlined, a histogram and the
//! saturation percentage. Building it touches no GUI code, so the numbers shown to the
//! operator can be tested directly. Views are handed to a [`FrameSink`]: the egui
//! window ([`crate::ui::WatcherApp`]) or the console ([`LogSink`]).

pub mod colormap;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::analysis::{self, HistogramBins};
use crate::config::RenderConfig;
use crate::container::{Frame, ImageContainer};
use crate::error::{AppResult, WatcherError};
use crate::timestamp::filetime_to_datetime;

pub use colormap::Colormap;

/// Color of the saturation outline (RGBA)
pub const OUTLINE_COLOR: [u8; 4] = [255, 0, 0, 255];

/// One channel panel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    /// Panel title (dye name or image name)
    pub label: String,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major RGBA, colormapped and outlined
    pub rgba: Vec<u8>,
    /// Lower end of the display window
    pub display_min: f64,
    /// Upper end of the display window (clip percentile)
    pub display_max: f64,
    /// Intensity histogram
    pub histogram: HistogramBins,
    /// Value counted as saturated
    pub saturation_max: u16,
    /// Share of pixels equal to `saturation_max`, in percent
    pub saturation_percent: f64,
}

impl ChannelView {
    /// Build the panel for one channel frame
    pub fn build(frame: &Frame, label: String, config: &RenderConfig) -> Self {
        let pixels = frame.pixels();
        let max = config.saturation_max;

        let display_min = analysis::min_max(pixels).map_or(0.0, |(min, _)| f64::from(min));
        let display_max = analysis::percentile(pixels, config.clip_percentile).unwrap_or(0.0);
        let outline = analysis::saturation_outline(frame, max);

        let mut rgba = Vec::with_capacity(pixels.len() * 4);
        for (&value, &on_outline) in pixels.iter().zip(&outline) {
            if on_outline {
                rgba.extend_from_slice(&OUTLINE_COLOR);
            } else {
                let level = config
                    .colormap
                    .apply(normalize(f64::from(value), display_min, display_max));
                rgba.extend_from_slice(&[level, level, level, 255]);
            }
        }

        Self {
            label,
            width: frame.width(),
            height: frame.height(),
            rgba,
            display_min,
            display_max,
            histogram: HistogramBins::compute(pixels, config.histogram_bins),
            saturation_max: max,
            saturation_percent: analysis::saturation_percent(pixels, max),
        }
    }

    /// Histogram annotation, e.g. `"10.00% sat"`
    pub fn saturation_text(&self) -> String {
        format!("{:.2}% sat", self.saturation_percent)
    }

    /// Right end of the histogram x-axis
    pub fn histogram_x_max(&self) -> f64 {
        f64::from(self.saturation_max) * 1.05
    }
}

/// Map `value` into 0..=1 over `[lo, hi]`, clipping outside. A collapsed window maps to 0.
fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// One figure: a selected image of a file
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    /// Source file
    pub file: PathBuf,
    /// Image name within the file
    pub image_name: String,
    /// Channel-0 acquisition time, when recorded
    pub acquired: Option<DateTime<Utc>>,
    /// Bits per pixel as stored in the file
    pub bit_depth: u32,
    /// Channel panels in channel order
    pub channels: Vec<ChannelView>,
}

impl FrameView {
    /// Build the view of image `index` of an opened container
    pub fn build(
        container: &dyn ImageContainer,
        index: usize,
        config: &RenderConfig,
    ) -> AppResult<Self> {
        let info = container.images().get(index).ok_or_else(|| {
            WatcherError::Render(format!(
                "{} has no image at index {index}",
                container.path().display()
            ))
        })?;
        let metadata = container.metadata();
        let frames = container.channel_frames(index)?;
        if let Some(frame) = frames
            .iter()
            .find(|f| (f.width(), f.height()) != (info.width, info.height))
        {
            return Err(WatcherError::Render(format!(
                "{}/{}: frame is {}x{} but the image is described as {}x{}",
                container.path().display(),
                info.name,
                frame.width(),
                frame.height(),
                info.width,
                info.height
            )));
        }

        let channels = frames
            .iter()
            .enumerate()
            .map(|(channel, frame)| {
                ChannelView::build(frame, metadata.lookup_label(&info.name, channel), config)
            })
            .collect();

        Ok(Self {
            file: container.path().to_path_buf(),
            image_name: info.name.clone(),
            acquired: metadata
                .lookup_timestamp(&info.name, 0)
                .and_then(filetime_to_datetime),
            bit_depth: info.bit_depth,
            channels,
        })
    }

    /// Image format, e.g. `"512x512, 4 ch, 8-bit"`
    pub fn format_text(&self) -> String {
        let (width, height) = self
            .channels
            .first()
            .map_or((0, 0), |c| (c.width, c.height));
        format!(
            "{width}x{height}, {} ch, {}-bit",
            self.channels.len(),
            self.bit_depth
        )
    }

    /// Figure title: `"<file>/<image>"`, with the acquisition time when known
    pub fn title(&self) -> String {
        let base = format!("{}/{}", self.file.display(), self.image_name);
        match self.acquired {
            Some(at) => format!("{base}  ({})", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => base,
        }
    }
}

/// Destination for rendered figures
pub trait FrameSink {
    /// Show a new set of figures, replacing whatever was shown before.
    ///
    /// `views` holds one figure per selected image; it is never empty.
    fn present(&mut self, views: Vec<FrameView>) -> AppResult<()>;
}

/// Console sink for headless runs: one log line per channel.
#[derive(Debug, Default)]
pub struct LogSink {
    presented: usize,
}

impl LogSink {
    /// New sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Figures presented so far
    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl FrameSink for LogSink {
    fn present(&mut self, views: Vec<FrameView>) -> AppResult<()> {
        for view in &views {
            tracing::info!(
                figure = %view.title(),
                format = %view.format_text(),
                "Figure"
            );
            for (index, channel) in view.channels.iter().enumerate() {
                tracing::info!(
                    channel = index,
                    label = %channel.label,
                    saturation = %channel.saturation_text(),
                    display_max = channel.display_max,
                    "  {}: {}",
                    channel.label,
                    channel.saturation_text()
                );
            }
        }
        self.presented += views.len();
        Ok(())
    }
}
