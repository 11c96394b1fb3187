//! # lif-watch
//!
//! Live saturation monitor for Leica LIF acquisitions. The watcher polls a folder,
//! opens the most recently modified `.lif` file, and shows every channel of the
//! selected image(s) with a log-scaled histogram and the share of saturated pixels,
//! so an operator can tune laser power and gain while acquiring.
//!
//! ## Crate Structure
//!
//! - **`scanner`**: lists candidate files and picks the newest one.
//! - **`lif`**: read-only LIF reader (XML header, memory blocks, first plane per channel).
//! - **`container`**: the `ImageContainer`/`ContainerOpener` traits the loop works
//!   against, plus in-memory mocks.
//! - **`metadata`**: dye names and acquisition timestamps from the XML header.
//! - **`timestamp`**: hex-float and FILETIME decoding.
//! - **`selector`**: which image(s) of a container to show (`all` or `latest`).
//! - **`analysis`**: saturation percentage, percentiles, histograms, saturation outline.
//! - **`render`**: GUI-free view model and the `FrameSink` trait.
//! - **`ui`**: the egui window.
//! - **`watcher`**: the poll cycle and its explicit state.
//! - **`config`**, **`logging`**, **`error`**: ambient plumbing.

pub mod analysis;
pub mod config;
pub mod container;
pub mod error;
pub mod lif;
pub mod logging;
pub mod metadata;
pub mod render;
pub mod scanner;
pub mod selector;
pub mod timestamp;
pub mod ui;
pub mod watcher;

pub use error::{AppResult, WatcherError};
