//! Poll cycle
//!
//! One cycle: find the newest matching file, and if it is not the file already on
//! screen, open it, pick the image(s) to show, build the views and hand them to a
//! [`FrameSink`]. The "already on screen" memory is a [`WatchState`] value passed in
//! and returned by [`Watcher::poll_once`]; nothing is kept in the watcher itself.
//!
//! Every failure inside a cycle is logged and the cycle is skipped. The state is only
//! advanced after the sink accepted the views, so a file caught mid-write is retried
//! on the next poll.

use std::time::Duration;

use crate::config::{RenderConfig, WatcherConfig};
use crate::container::ContainerOpener;
use crate::error::{AppResult, WatcherError};
use crate::lif::LifOpener;
use crate::render::{FrameSink, FrameView};
use crate::scanner::{DirectoryScanner, FileIdentity};
use crate::selector::select_images;

/// What the watcher remembers between cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    /// File shown by the last successful render
    pub last_displayed: Option<FileIdentity>,
}

impl WatchState {
    /// Whether `candidate` differs from the file on screen
    pub fn is_new(&self, candidate: &FileIdentity) -> bool {
        self.last_displayed.as_ref() != Some(candidate)
    }

    /// State after `identity` has been rendered
    pub fn displayed(identity: FileIdentity) -> Self {
        Self {
            last_displayed: Some(identity),
        }
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No file matches the pattern
    NoFiles,
    /// The newest file is the one already shown
    Unchanged,
    /// The newest file holds no images yet
    NoImages(FileIdentity),
    /// New figures were presented
    Rendered {
        /// File that was shown
        file: FileIdentity,
        /// Number of figures (selected images)
        figures: usize,
    },
    /// The cycle failed and will be retried
    Skipped(String),
}

impl CycleOutcome {
    /// Whether the sink received new figures
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// Scanner, container reader and render settings wired together
pub struct Watcher {
    scanner: DirectoryScanner,
    opener: Box<dyn ContainerOpener>,
    render: RenderConfig,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("scanner", &self.scanner)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Watcher over `scanner`, reading files through `opener`
    pub fn new(
        scanner: DirectoryScanner,
        opener: Box<dyn ContainerOpener>,
        render: RenderConfig,
    ) -> Self {
        Self {
            scanner,
            opener,
            render,
        }
    }

    /// Watcher reading LIF files from the configured directory
    pub fn from_config(config: &WatcherConfig) -> AppResult<Self> {
        let scanner = DirectoryScanner::new(&config.watch.directory, &config.watch.pattern)?;
        Ok(Self::new(
            scanner,
            Box::new(LifOpener),
            config.render.clone(),
        ))
    }

    /// Directory scanner in use
    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    /// Render settings in use
    pub fn render_config(&self) -> &RenderConfig {
        &self.render
    }

    /// Run one cycle and return the next state.
    pub fn poll_once(
        &self,
        state: WatchState,
        sink: &mut dyn FrameSink,
    ) -> (WatchState, CycleOutcome) {
        let span = tracing::debug_span!("poll", dir = %self.scanner.directory().display());
        let _enter = span.enter();

        match self.cycle(&state, sink) {
            Ok(outcome) => {
                let next = match &outcome {
                    CycleOutcome::Rendered { file, .. } => WatchState::displayed(file.clone()),
                    _ => state,
                };
                (next, outcome)
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(error = %err, "Poll cycle skipped, retrying next interval");
                } else {
                    tracing::error!(error = %err, "Poll cycle failed");
                }
                (state, CycleOutcome::Skipped(err.to_string()))
            }
        }
    }

    fn cycle(&self, state: &WatchState, sink: &mut dyn FrameSink) -> AppResult<CycleOutcome> {
        let Some(entry) = self.scanner.latest()? else {
            tracing::debug!("No matching files");
            return Ok(CycleOutcome::NoFiles);
        };
        let identity = entry.identity();
        if !state.is_new(&identity) {
            return Ok(CycleOutcome::Unchanged);
        }

        tracing::info!("Showing: {}", entry.path.display());
        let container = self.opener.open(&entry.path)?;
        let selected = select_images(container.as_ref(), self.render.policy);
        if selected.is_empty() {
            tracing::info!(file = %entry.path.display(), "Container has no images yet");
            return Ok(CycleOutcome::NoImages(identity));
        }

        let views = selected
            .iter()
            .map(|&index| FrameView::build(container.as_ref(), index, &self.render))
            .collect::<AppResult<Vec<_>>>()?;
        if views.iter().all(|view| view.channels.is_empty()) {
            return Err(WatcherError::container(
                &entry.path,
                "selected images have no channels",
            ));
        }

        let figures = views.len();
        sink.present(views)?;
        Ok(CycleOutcome::Rendered {
            file: identity,
            figures,
        })
    }

    /// Poll in a loop on the current thread, sleeping `interval` between cycles.
    ///
    /// With `once` a single cycle runs. Otherwise this only returns when the process
    /// is interrupted.
    pub fn run_headless(
        &self,
        sink: &mut dyn FrameSink,
        interval: Duration,
        once: bool,
    ) -> WatchState {
        tracing::info!("Watching folder {}", self.scanner.directory().display());
        let mut state = WatchState::default();
        loop {
            let (next, outcome) = self.poll_once(state, sink);
            tracing::trace!(?outcome, "Cycle finished");
            state = next;
            if once {
                return state;
            }
            std::thread::sleep(interval);
        }
    }
}
