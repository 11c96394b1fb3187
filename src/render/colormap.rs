//! Grayscale colormaps for the image panels

use serde::{Deserialize, Serialize};

/// How normalized intensity maps to a gray level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// White background, dark signal (matplotlib "Greys")
    #[default]
    Greys,
    /// Black background, bright signal
    Gray,
}

impl Colormap {
    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Greys => "Greys",
            Self::Gray => "Gray",
        }
    }

    /// Gray level for `t` in 0..=1 (values outside are clamped)
    pub fn apply(&self, t: f64) -> u8 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let level = match self {
            Self::Greys => 1.0 - t,
            Self::Gray => t,
        };
        (level * 255.0).round() as u8
    }
}
