//! eframe application: one persistent window for the whole session.
//!
//! The poll cycle runs inside [`eframe::App::update`] whenever the poll deadline has
//! passed, and `request_repaint_after` wakes the UI for the next one, so the window
//! stays responsive between polls without a second thread.

use std::path::Path;
use std::time::{Duration, Instant};

use eframe::egui;

use crate::config::RenderConfig;
use crate::error::{AppResult, WatcherError};
use crate::render::{ChannelView, FrameSink, FrameView};
use crate::watcher::{CycleOutcome, WatchState, Watcher};

use super::histogram::SaturationHistogram;
use super::layout::{fit_aspect, FigureLayout};

/// Minimum on-screen height of one figure
const MIN_FIGURE_HEIGHT: f32 = 420.0;
/// Height of the channel label above each image
const LABEL_HEIGHT: f32 = 18.0;

struct ShownChannel {
    view: ChannelView,
    texture: egui::TextureHandle,
}

struct ShownFigure {
    title: String,
    channels: Vec<ShownChannel>,
}

/// Textures and views currently on screen. Receives new figures as a [`FrameSink`].
pub struct FigureBoard {
    ctx: egui::Context,
    figures: Vec<ShownFigure>,
}

impl FigureBoard {
    /// Empty board drawing into `ctx`
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            figures: Vec::new(),
        }
    }

    /// Number of figures on screen
    pub fn len(&self) -> usize {
        self.figures.len()
    }

    /// Whether nothing has been shown yet
    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    fn upload(
        &self,
        figure: usize,
        channel: usize,
        view: &mut ChannelView,
    ) -> AppResult<egui::TextureHandle> {
        if view.width == 0 || view.height == 0 {
            return Err(WatcherError::Render(format!(
                "channel '{}' has an empty frame",
                view.label
            )));
        }
        let rgba = std::mem::take(&mut view.rgba);
        let image = egui::ColorImage::from_rgba_unmultiplied([view.width, view.height], &rgba);
        Ok(self.ctx.load_texture(
            format!("figure{figure}_channel{channel}"),
            image,
            egui::TextureOptions::NEAREST,
        ))
    }

    /// Draw every figure, stacked vertically
    pub fn show(&self, ui: &mut egui::Ui) {
        let figure_height = ui.available_height().max(MIN_FIGURE_HEIGHT);
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for figure in &self.figures {
                    let size = egui::vec2(ui.available_width(), figure_height);
                    let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
                    paint_figure(ui.painter(), rect, figure);
                    ui.separator();
                }
            });
    }
}

impl FrameSink for FigureBoard {
    fn present(&mut self, views: Vec<FrameView>) -> AppResult<()> {
        let mut figures = Vec::with_capacity(views.len());
        for (figure_index, view) in views.into_iter().enumerate() {
            let title = format!("{}  [{}]", view.title(), view.format_text());
            let mut channels = Vec::with_capacity(view.channels.len());
            for (channel_index, mut channel) in view.channels.into_iter().enumerate() {
                let texture = self.upload(figure_index, channel_index, &mut channel)?;
                channels.push(ShownChannel {
                    view: channel,
                    texture,
                });
            }
            figures.push(ShownFigure { title, channels });
        }

        if let Some(first) = figures.first() {
            self.ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
                "lif-watch: {}",
                first.title
            )));
        }
        self.figures = figures;
        self.ctx.request_repaint();
        Ok(())
    }
}

fn paint_figure(painter: &egui::Painter, rect: egui::Rect, figure: &ShownFigure) {
    let layout = FigureLayout::compute(rect, figure.channels.len());
    let text_color = painter.ctx().style().visuals.text_color();

    painter.text(
        layout.title.center(),
        egui::Align2::CENTER_CENTER,
        &figure.title,
        egui::FontId::proportional(16.0),
        text_color,
    );

    for (panel, channel) in layout.panels.iter().zip(&figure.channels) {
        let label_rect = egui::Rect::from_min_max(
            panel.image.min,
            egui::pos2(panel.image.max.x, panel.image.min.y + LABEL_HEIGHT),
        );
        painter.text(
            label_rect.center(),
            egui::Align2::CENTER_CENTER,
            &channel.view.label,
            egui::FontId::proportional(13.0),
            text_color,
        );

        let image_area = egui::Rect::from_min_max(
            egui::pos2(panel.image.min.x, label_rect.max.y),
            panel.image.max,
        );
        let aspect = channel.view.width as f32 / channel.view.height as f32;
        painter.image(
            channel.texture.id(),
            fit_aspect(image_area, aspect),
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        SaturationHistogram::new(&channel.view).paint(painter, panel.histogram);
    }
}

/// Status bar text for the last cycle
pub fn status_text(outcome: Option<&CycleOutcome>) -> String {
    match outcome {
        None => "Starting".to_string(),
        Some(CycleOutcome::NoFiles) => "No matching files yet".to_string(),
        Some(CycleOutcome::Unchanged) => "Up to date".to_string(),
        Some(CycleOutcome::NoImages(file)) => {
            format!("{} has no images yet", file.path.display())
        }
        Some(CycleOutcome::Rendered { file, figures }) => {
            format!("Showing {} ({figures} figure(s))", file.path.display())
        }
        Some(CycleOutcome::Skipped(reason)) => format!("Retrying: {reason}"),
    }
}

/// Status bar text for the active settings
pub fn settings_text(directory: &Path, config: &RenderConfig) -> String {
    format!(
        "{} | policy: {} | colormap: {} | max: {}",
        directory.display(),
        config.policy.label(),
        config.colormap.label(),
        config.saturation_max
    )
}

/// The monitor window
pub struct WatcherApp {
    watcher: Watcher,
    state: WatchState,
    board: FigureBoard,
    interval: Duration,
    next_poll: Instant,
    last_outcome: Option<CycleOutcome>,
}

impl WatcherApp {
    /// Build the app; the first poll runs on the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>, watcher: Watcher, interval: Duration) -> Self {
        tracing::info!("Watching folder {}", watcher.scanner().directory().display());
        Self {
            board: FigureBoard::new(cc.egui_ctx.clone()),
            watcher,
            state: WatchState::default(),
            interval,
            next_poll: Instant::now(),
            last_outcome: None,
        }
    }

    fn poll_if_due(&mut self, now: Instant) {
        if now < self.next_poll {
            return;
        }
        let state = std::mem::take(&mut self.state);
        let (state, outcome) = self.watcher.poll_once(state, &mut self.board);
        self.state = state;
        self.last_outcome = Some(outcome);
        self.next_poll = now + self.interval;
    }
}

impl eframe::App for WatcherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.poll_if_due(now);
        ctx.request_repaint_after(self.next_poll.saturating_duration_since(now));

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(status_text(self.last_outcome.as_ref()));
                ui.separator();
                ui.weak(settings_text(
                    self.watcher.scanner().directory(),
                    self.watcher.render_config(),
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.board.is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label(format!(
                        "Waiting for files in {}",
                        self.watcher.scanner().directory().display()
                    ));
                });
            } else {
                self.board.show(ui);
            }
        });
    }
}
