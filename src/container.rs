//! Image container abstraction
//!
//! The watch loop never talks to the LIF reader directly. It goes through
//! [`ContainerOpener`] and [`ImageContainer`], which expose just what the monitor
//! needs: the list of images, the channel frames of one image and the metadata.
//! [`crate::lif::LifOpener`] is the real implementation; [`mock`] holds an in-memory
//! one for tests and demos.

use std::path::Path;

use crate::error::{AppResult, WatcherError};
use crate::metadata::MetadataSource;

/// One channel of an image: a row-major 2D intensity array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u16>,
}

impl Frame {
    /// Build a frame, checking the pixel count against the dimensions
    pub fn new(width: usize, height: usize, pixels: Vec<u16>) -> AppResult<Self> {
        if width.checked_mul(height) != Some(pixels.len()) {
            return Err(WatcherError::Render(format!(
                "frame of {width}x{height} needs {} pixels, got {}",
                width.saturating_mul(height),
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame with every pixel set to `value`
    pub fn filled(width: usize, height: usize, value: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixel values
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Whether the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Summary of one image inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image name as shown in the acquisition software (e.g. `Series003`)
    pub name: String,
    /// Number of channels
    pub channels: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Bits per pixel of the first channel
    pub bit_depth: u32,
}

/// An opened container file
pub trait ImageContainer {
    /// File the container was read from
    fn path(&self) -> &Path;

    /// Images in enumeration order
    fn images(&self) -> &[ImageInfo];

    /// Frames of every channel of image `index` (first plane of any z/t/tile stack)
    fn channel_frames(&self, index: usize) -> AppResult<Vec<Frame>>;

    /// Metadata queries for this container
    fn metadata(&self) -> &dyn MetadataSource;
}

/// Opens container files by path
pub trait ContainerOpener {
    /// Open and index a file. The file handle is not kept past this call.
    fn open(&self, path: &Path) -> AppResult<Box<dyn ImageContainer>>;
}

pub mod mock {
    //! In-memory containers for tests and demos.

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use super::{ContainerOpener, Frame, ImageContainer, ImageInfo};
    use crate::error::{AppResult, WatcherError};
    use crate::metadata::{MetadataSource, StaticMetadata};

    /// A container whose images live in memory
    #[derive(Debug, Clone)]
    pub struct MockContainer {
        path: PathBuf,
        infos: Vec<ImageInfo>,
        frames: Vec<Vec<Frame>>,
        metadata: StaticMetadata,
    }

    impl MockContainer {
        /// Empty container (zero images)
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                infos: Vec::new(),
                frames: Vec::new(),
                metadata: StaticMetadata::new(),
            }
        }

        /// Append an image made of `frames`
        pub fn with_image(mut self, name: &str, frames: Vec<Frame>) -> Self {
            let (width, height) = frames
                .first()
                .map(|f| (f.width(), f.height()))
                .unwrap_or((0, 0));
            self.infos.push(ImageInfo {
                name: name.to_string(),
                channels: frames.len(),
                width,
                height,
                bit_depth: 8,
            });
            self.frames.push(frames);
            self
        }

        /// Replace the metadata
        pub fn with_metadata(mut self, metadata: StaticMetadata) -> Self {
            self.metadata = metadata;
            self
        }
    }

    impl ImageContainer for MockContainer {
        fn path(&self) -> &Path {
            &self.path
        }

        fn images(&self) -> &[ImageInfo] {
            &self.infos
        }

        fn channel_frames(&self, index: usize) -> AppResult<Vec<Frame>> {
            self.frames.get(index).cloned().ok_or_else(|| {
                WatcherError::container(&self.path, format!("no image at index {index}"))
            })
        }

        fn metadata(&self) -> &dyn MetadataSource {
            &self.metadata
        }
    }

    /// Opener serving registered containers by path and counting opens.
    ///
    /// Paths without a registered container fail like a malformed file would.
    #[derive(Debug, Clone, Default)]
    pub struct MockOpener {
        containers: Arc<Mutex<HashMap<PathBuf, MockContainer>>>,
        opens: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MockOpener {
        /// Opener with nothing registered
        pub fn new() -> Self {
            Self::default()
        }

        /// Register (or replace) the container returned for `path`
        pub fn insert(&self, path: impl Into<PathBuf>, container: MockContainer) {
            if let Ok(mut map) = self.containers.lock() {
                map.insert(path.into(), container);
            }
        }

        /// Paths opened so far, in order
        pub fn opened(&self) -> Vec<PathBuf> {
            self.opens.lock().map(|o| o.clone()).unwrap_or_default()
        }
    }

    impl ContainerOpener for MockOpener {
        fn open(&self, path: &Path) -> AppResult<Box<dyn ImageContainer>> {
            if let Ok(mut opens) = self.opens.lock() {
                opens.push(path.to_path_buf());
            }
            let map = self
                .containers
                .lock()
                .map_err(|_| WatcherError::container(path, "mock registry poisoned"))?;
            map.get(path)
                .cloned()
                .map(|c| Box::new(c) as Box<dyn ImageContainer>)
                .ok_or_else(|| WatcherError::container(path, "not a registered container"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockContainer, MockOpener};
    use super::*;

    #[test]
    fn test_frame_dimension_check() {
        assert!(Frame::new(2, 2, vec![0; 4]).is_ok());
        assert!(Frame::new(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_frame_get() {
        let frame = Frame::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(frame.get(1, 0), Some(2));
        assert_eq!(frame.get(0, 1), Some(3));
        assert_eq!(frame.get(2, 0), None);
    }

    #[test]
    fn test_mock_opener_roundtrip() {
        let opener = MockOpener::new();
        opener.insert(
            "a.lif",
            MockContainer::new("a.lif").with_image("S1", vec![Frame::filled(2, 2, 7)]),
        );

        let container = opener.open(Path::new("a.lif")).unwrap();
        assert_eq!(container.images().len(), 1);
        assert_eq!(container.images()[0].channels, 1);
        assert_eq!(container.channel_frames(0).unwrap()[0].get(1, 1), Some(7));
        assert!(opener.open(Path::new("b.lif")).is_err());
        assert_eq!(opener.opened().len(), 2);
    }
}
