//! CLI entry point for lif-watch
//!
//! Watches a folder and shows the newest LIF file's channels with saturation
//! histograms, refreshing whenever a newer file (or a newer save of the same file)
//! appears.
//!
//! # Usage
//!
//! ```bash
//! lif-watch /data/session-42
//! lif-watch /data/session-42 --interval 5 --max 4095 --policy all
//! lif-watch /data/session-42 --headless --once
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use lif_watch::config::{Overrides, WatcherConfig};
use lif_watch::logging;
use lif_watch::render::{Colormap, LogSink};
use lif_watch::selector::SelectionPolicy;
use lif_watch::ui::WatcherApp;
use lif_watch::watcher::Watcher;

#[derive(Parser)]
#[command(name = "lif-watch")]
#[command(about = "Live saturation monitor for Leica LIF acquisitions", long_about = None)]
struct Cli {
    /// Folder to watch
    directory: PathBuf,

    /// Seconds between polls
    #[arg(long)]
    interval: Option<f64>,

    /// Intensity counted as saturated
    #[arg(long)]
    max: Option<u16>,

    /// Which image(s) of the newest file to show
    #[arg(long, value_enum)]
    policy: Option<SelectionPolicy>,

    /// Candidate file pattern, '*' followed by a suffix
    #[arg(long)]
    pattern: Option<String>,

    /// Colormap for the image panels
    #[arg(long, value_enum)]
    colormap: Option<Colormap>,

    /// TOML config file (default: lif-watch.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log results instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Run a single poll cycle and exit (implies --headless)
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    log_format: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            directory: Some(self.directory.clone()),
            pattern: self.pattern.clone(),
            poll_interval_secs: self.interval,
            saturation_max: self.max,
            policy: self.policy,
            colormap: self.colormap,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = WatcherConfig::load_with(cli.config.as_deref(), cli.overrides())
        .context("Failed to load configuration")?;
    logging::init_from_config(&config)?;

    if !config.watch.directory.is_dir() {
        tracing::warn!(
            "{} is not a directory yet, waiting for it to appear",
            config.watch.directory.display()
        );
    }

    let watcher = Watcher::from_config(&config)?;
    let interval = config.poll_interval();

    if cli.headless || cli.once {
        let mut sink = LogSink::new();
        watcher.run_headless(&mut sink, interval, cli.once);
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 900.0])
            .with_min_inner_size([600.0, 450.0])
            .with_title("lif-watch"),
        ..Default::default()
    };

    eframe::run_native(
        "lif-watch",
        options,
        Box::new(move |cc| Ok(Box::new(WatcherApp::new(cc, watcher, interval)))),
    )
    .map_err(|e| anyhow::anyhow!("Window error: {e}"))
}
