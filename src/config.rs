//! Configuration System using Figment
//!
//! Configuration is layered, later sources winning:
//! 1. Built-in defaults (`WatcherConfig::default()`)
//! 2. An optional TOML file (`--config <file>`, else `lif-watch.toml` in the working directory)
//! 3. Environment variables prefixed with `LIF_WATCH_`, nested keys split on `__`
//! 4. Command-line flags (see [`Overrides`])
//!
//! # Example
//! ```no_run
//! use lif_watch::config::WatcherConfig;
//!
//! let config = WatcherConfig::load(None)?;
//! println!("Polling every {:?}", config.poll_interval());
//! # Ok::<(), lif_watch::error::WatcherError>(())
//! ```
//!
//! Environment example: `LIF_WATCH_RENDER__SATURATION_MAX=4095`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, WatcherError};
use crate::render::Colormap;
use crate::selector::SelectionPolicy;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "lif-watch.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LIF_WATCH_";

/// Longest accepted poll interval (one day).
pub const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WatcherConfig {
    /// Folder polling settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Image selection and plotting settings
    #[serde(default)]
    pub render: RenderConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Folder polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Wildcard suffix pattern for candidate files (e.g. `*lif`)
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Seconds between polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

/// Rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Intensity counted as saturated (sensor maximum)
    #[serde(default = "default_saturation_max")]
    pub saturation_max: u16,
    /// Which image(s) of a container to show
    #[serde(default)]
    pub policy: SelectionPolicy,
    /// Colormap for the image panels
    #[serde(default)]
    pub colormap: Colormap,
    /// Upper display percentile for contrast clipping
    #[serde(default = "default_clip_percentile")]
    pub clip_percentile: f64,
    /// Histogram bin count
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_pattern() -> String {
    "*lif".to_string()
}

fn default_poll_interval() -> f64 {
    10.0
}

fn default_saturation_max() -> u16 {
    255
}

fn default_clip_percentile() -> f64 {
    99.0
}

fn default_histogram_bins() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            pattern: default_pattern(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            saturation_max: default_saturation_max(),
            policy: SelectionPolicy::default(),
            colormap: Colormap::default(),
            clip_percentile: default_clip_percentile(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Positional directory argument
    pub directory: Option<PathBuf>,
    /// `--pattern`
    pub pattern: Option<String>,
    /// `--interval`
    pub poll_interval_secs: Option<f64>,
    /// `--max`
    pub saturation_max: Option<u16>,
    /// `--policy`
    pub policy: Option<SelectionPolicy>,
    /// `--colormap`
    pub colormap: Option<Colormap>,
    /// `--log-level`
    pub log_level: Option<String>,
    /// `--log-format`
    pub log_format: Option<String>,
}

impl Overrides {
    /// Merge the set values on top of `figment`.
    pub fn apply(self, mut figment: Figment) -> Figment {
        if let Some(dir) = self.directory {
            figment = figment.merge(Serialized::default("watch.directory", dir));
        }
        if let Some(pattern) = self.pattern {
            figment = figment.merge(Serialized::default("watch.pattern", pattern));
        }
        if let Some(secs) = self.poll_interval_secs {
            figment = figment.merge(Serialized::default("watch.poll_interval_secs", secs));
        }
        if let Some(max) = self.saturation_max {
            figment = figment.merge(Serialized::default("render.saturation_max", max));
        }
        if let Some(policy) = self.policy {
            figment = figment.merge(Serialized::default("render.policy", policy));
        }
        if let Some(colormap) = self.colormap {
            figment = figment.merge(Serialized::default("render.colormap", colormap));
        }
        if let Some(level) = self.log_level {
            figment = figment.merge(Serialized::default("logging.level", level));
        }
        if let Some(format) = self.log_format {
            figment = figment.merge(Serialized::default("logging.format", format));
        }
        figment
    }
}

impl WatcherConfig {
    /// Layered figment: defaults, TOML file, then `LIF_WATCH_` environment variables.
    ///
    /// A missing TOML file is not an error; figment simply contributes nothing for it.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(WatcherConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration without command-line overrides.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        Self::from_figment(Self::figment(config_file))
    }

    /// Load, apply command-line overrides, validate.
    pub fn load_with(config_file: Option<&Path>, overrides: Overrides) -> AppResult<Self> {
        Self::from_figment(overrides.apply(Self::figment(config_file)))
    }

    /// Extract from an arbitrary figment and validate.
    pub fn from_figment(figment: Figment) -> AppResult<Self> {
        let config: WatcherConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(WatcherError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(WatcherError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        let secs = self.watch.poll_interval_secs;
        if !(secs > 0.0 && secs <= MAX_POLL_INTERVAL_SECS) {
            return Err(WatcherError::Configuration(format!(
                "poll_interval_secs must be in (0, {MAX_POLL_INTERVAL_SECS}], got {secs}"
            )));
        }

        if crate::scanner::FilePattern::parse(&self.watch.pattern).is_none() {
            return Err(WatcherError::Configuration(format!(
                "Invalid file pattern '{}'. Expected '*' followed by a suffix, e.g. '*lif'",
                self.watch.pattern
            )));
        }

        if self.render.saturation_max == 0 {
            return Err(WatcherError::Configuration(
                "saturation_max must be greater than 0".to_string(),
            ));
        }

        if !(self.render.clip_percentile > 0.0 && self.render.clip_percentile <= 100.0) {
            return Err(WatcherError::Configuration(format!(
                "clip_percentile must be in (0, 100], got {}",
                self.render.clip_percentile
            )));
        }

        if self.render.histogram_bins == 0 {
            return Err(WatcherError::Configuration(
                "histogram_bins must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Poll interval as a `Duration`.
    ///
    /// Values `validate` would reject fall back to the default interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.watch.poll_interval_secs)
            .ok()
            .filter(|d| !d.is_zero() && d.as_secs_f64() <= MAX_POLL_INTERVAL_SECS)
            .unwrap_or_else(|| Duration::from_secs_f64(default_poll_interval()))
    }
}
