//! LIF reader tests against files written to disk
//!
//! Covers header parsing, block indexing for both size widths, strided 8/16-bit
//! reads, metadata lookups and files caught mid-write.

mod common;

use common::{LifBuilder, TestImage, TICKS_2020};
use lif_watch::container::{ContainerOpener, ImageContainer};
use lif_watch::error::WatcherError;
use lif_watch::lif::{LifFile, LifOpener};
use lif_watch::metadata::{LookupError, MetadataSource};

// =============================================================================
// Structure
// =============================================================================

#[test]
fn test_images_and_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.lif");
    LifBuilder::new()
        .image(TestImage::uniform("Series001", 4, 3, 2, 10))
        .image(TestImage::uniform("Series002", 5, 5, 1, 20))
        .write(&path);

    let lif = LifFile::open(&path).unwrap();
    assert_eq!(lif.version(), 2);
    let images = lif.images();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].name, "Series001");
    assert_eq!((images[0].width, images[0].height), (4, 3));
    assert_eq!(images[0].channels, 2);
    assert_eq!(images[0].bit_depth, 8);
    assert_eq!(images[1].name, "Series002");
}

#[test]
fn test_version_one_block_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.lif");
    LifBuilder::new()
        .version(1)
        .image(TestImage::uniform("Series001", 2, 2, 1, 7))
        .write(&path);

    let lif = LifFile::open(&path).unwrap();
    assert_eq!(lif.version(), 1);
    let frames = lif.channel_frames(0).unwrap();
    assert_eq!(frames[0].pixels(), &[7, 7, 7, 7]);
}

// =============================================================================
// Pixel data
// =============================================================================

#[test]
fn test_channels_are_read_from_their_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two.lif");
    let image = TestImage::uniform("Series001", 3, 2, 2, 0)
        .with_channel(0, vec![1, 2, 3, 4, 5, 6])
        .with_channel(1, vec![60, 50, 40, 30, 20, 10]);
    LifBuilder::new().image(image).write(&path);

    let lif = LifFile::open(&path).unwrap();
    let frames = lif.channel_frames(0).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].pixels(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(frames[1].pixels(), &[60, 50, 40, 30, 20, 10]);
    assert_eq!(frames[0].get(2, 1), Some(6));
}

#[test]
fn test_sixteen_bit_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep.lif");
    let image = TestImage::uniform("Series001", 2, 2, 1, 0)
        .sixteen_bit()
        .with_channel(0, vec![0, 4095, 256, 65535]);
    LifBuilder::new().image(image).write(&path);

    let lif = LifFile::open(&path).unwrap();
    assert_eq!(lif.images()[0].bit_depth, 16);
    let frame = lif.read_frame(0, 0).unwrap();
    assert_eq!(frame.pixels(), &[0, 4095, 256, 65535]);
}

#[test]
fn test_bad_indices_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.lif");
    LifBuilder::new()
        .image(TestImage::uniform("Series001", 2, 2, 1, 0))
        .write(&path);

    let lif = LifFile::open(&path).unwrap();
    assert!(matches!(lif.read_frame(0, 3), Err(WatcherError::Container { .. })));
    assert!(matches!(lif.channel_frames(5), Err(WatcherError::Container { .. })));
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_dyes_and_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.lif");
    let image = TestImage::uniform("Series001", 2, 2, 2, 0)
        .with_dyes(&["DAPI", "Alexa 488"])
        .with_timestamps(&[TICKS_2020, TICKS_2020 + 10_000_000]);
    LifBuilder::new()
        .image(image)
        .image(TestImage::uniform("Series002", 2, 2, 1, 0))
        .write(&path);

    let lif = LifFile::open(&path).unwrap();
    let metadata = lif.metadata();
    assert_eq!(metadata.dye_name("Series001", 1).unwrap(), "Alexa 488");
    assert_eq!(metadata.timestamp("Series001", 0).unwrap(), TICKS_2020 as f64);
    assert_eq!(metadata.lookup_label("Series002", 0), "Series002");
    assert_eq!(metadata.lookup_timestamp("Series002", 0), None);
    assert!(matches!(
        metadata.dye_name("Series001", 2),
        Err(LookupError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        metadata.dye_name("Series999", 0),
        Err(LookupError::ImageNotFound(_))
    ));
}

// =============================================================================
// Damaged and partial files
// =============================================================================

#[test]
fn test_not_a_lif_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.lif");
    std::fs::write(&path, b"just some text, not a container").unwrap();

    let err = LifOpener.open(&path).err().unwrap();
    assert!(matches!(err, WatcherError::Container { .. }));
    assert!(err.is_transient());
}

#[test]
fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.lif");
    std::fs::write(&path, b"").unwrap();

    assert!(matches!(
        LifFile::open(&path),
        Err(WatcherError::Container { .. })
    ));
}

#[test]
fn test_missing_last_block_hides_that_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saving.lif");
    let bytes = LifBuilder::new()
        .image(TestImage::uniform("Series001", 4, 4, 1, 1))
        .image(TestImage::uniform("Series002", 4, 4, 1, 2))
        .bytes();
    // cut into the payload of the second block
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let lif = LifFile::open(&path).unwrap();
    let names: Vec<&str> = lif.images().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Series001"]);
    assert_eq!(lif.channel_frames(0).unwrap()[0].pixels(), &[1; 16]);
}
