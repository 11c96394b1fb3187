//! egui front end
//!
//! - [`layout`]: figure grid geometry
//! - [`histogram`]: log-scaled saturation histogram
//! - [`app`]: the persistent monitor window

pub mod app;
pub mod histogram;
pub mod layout;

pub use app::{FigureBoard, WatcherApp};
