//! Image selection
//!
//! A container may hold one image per file (users who save each acquisition to its own
//! file) or a whole session of images (users who keep saving into the same project).
//! [`SelectionPolicy`] covers both cases with one code path.

use serde::{Deserialize, Serialize};

use crate::container::ImageContainer;

/// Which image(s) of a container to render
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Every image in the container
    All,
    /// The image with the latest channel-0 acquisition timestamp
    #[default]
    Latest,
}

impl SelectionPolicy {
    /// Config/CLI spelling
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Latest => "latest",
        }
    }
}

/// Indices of the images to render, in render order.
///
/// Empty when the container has no images.
pub fn select_images(container: &dyn ImageContainer, policy: SelectionPolicy) -> Vec<usize> {
    let images = container.images();
    match policy {
        SelectionPolicy::All => (0..images.len()).collect(),
        SelectionPolicy::Latest => {
            let metadata = container.metadata();
            let keys: Vec<Option<f64>> = images
                .iter()
                .map(|image| metadata.lookup_timestamp(&image.name, 0))
                .collect();
            latest_index(&keys).into_iter().collect()
        }
    }
}

/// Position of the maximum timestamp; `None` keys rank below every timestamp.
///
/// The first of several equal maxima wins, and with no timestamps at all the first
/// entry is chosen.
pub fn latest_index(keys: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, key) in keys.iter().enumerate() {
        let key = key.filter(|k| !k.is_nan()).unwrap_or(f64::NEG_INFINITY);
        match best {
            Some((_, best_key)) if key <= best_key => {}
            _ => best = Some((index, key)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::mock::MockContainer;
    use crate::container::Frame;
    use crate::metadata::StaticMetadata;

    fn frames() -> Vec<Frame> {
        vec![Frame::filled(2, 2, 0)]
    }

    #[test]
    fn test_latest_index() {
        assert_eq!(latest_index(&[]), None);
        assert_eq!(latest_index(&[Some(1.0), Some(3.0), Some(2.0)]), Some(1));
        assert_eq!(latest_index(&[Some(5.0), Some(5.0)]), Some(0));
        assert_eq!(latest_index(&[None, Some(0.5), None]), Some(1));
        assert_eq!(latest_index(&[None, None]), Some(0));
        assert_eq!(latest_index(&[Some(f64::NAN), Some(-1.0)]), Some(1));
    }

    #[test]
    fn test_latest_policy_uses_channel_zero_timestamp() {
        let container = MockContainer::new("session.lif")
            .with_image("Series001", frames())
            .with_image("Series002", frames())
            .with_image("Series003", frames())
            .with_metadata(
                StaticMetadata::new()
                    .with_timestamps("Series001", [100.0, 900.0])
                    .with_timestamps("Series002", [300.0])
                    .with_timestamps("Series003", [200.0]),
            );
        assert_eq!(select_images(&container, SelectionPolicy::Latest), vec![1]);
    }

    #[test]
    fn test_all_policy() {
        let container = MockContainer::new("a.lif")
            .with_image("A", frames())
            .with_image("B", frames());
        assert_eq!(select_images(&container, SelectionPolicy::All), vec![0, 1]);
    }

    #[test]
    fn test_empty_container_selects_nothing() {
        let container = MockContainer::new("empty.lif");
        assert!(select_images(&container, SelectionPolicy::All).is_empty());
        assert!(select_images(&container, SelectionPolicy::Latest).is_empty());
    }
}
