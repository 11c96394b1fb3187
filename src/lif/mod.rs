//! Read-only Leica LIF reader
//!
//! A LIF file is a UTF-16 XML header followed by memory blocks of raw pixel data.
//! [`LifFile::open`] reads the header and indexes the blocks; pixel data is read on
//! demand by [`LifFile::read_frame`], which opens the file again, reads the first plane
//! of one channel and closes it. No handle outlives a call, so the acquisition
//! software is free to rewrite the file between polls.
//!
//! Only what the monitor needs is supported: 8-bit and 16-bit (incl. 12-bit stored in
//! 16) pixels, first z/t/tile plane. Writing is not supported.

pub mod blocks;
pub mod header;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use roxmltree::Document;

use crate::container::{ContainerOpener, Frame, ImageContainer, ImageInfo};
use crate::error::{AppResult, WatcherError};
use crate::metadata::{MetadataSource, XmlMetadata};

use self::blocks::{index_memory_blocks, read_xml_header, MemoryBlock};
use self::header::{container_version, image_descriptors, ImageDescriptor};

/// An opened LIF file
#[derive(Debug, Clone)]
pub struct LifFile {
    path: PathBuf,
    version: u32,
    descriptors: Vec<ImageDescriptor>,
    infos: Vec<ImageInfo>,
    blocks: HashMap<String, MemoryBlock>,
    metadata: XmlMetadata,
}

impl LifFile {
    /// Read the header and index the memory blocks of `path`.
    ///
    /// Images whose memory block has not been written yet (file caught mid-save) are
    /// left out of [`LifFile::images`] rather than failing the whole file.
    pub fn open(path: &Path) -> AppResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let xml = read_xml_header(&mut reader)
            .map_err(|e| WatcherError::container(path, e.to_string()))?;
        let doc = Document::parse(&xml)?;
        let version = container_version(&doc);

        let index = index_memory_blocks(&mut reader, version, file_len)
            .map_err(|e| WatcherError::container(path, e.to_string()))?;
        if let Some(offset) = index.truncated_at {
            tracing::debug!(
                file = %path.display(),
                offset,
                "Block walk stopped at incomplete block"
            );
        }

        let mut descriptors = Vec::new();
        for descriptor in image_descriptors(&doc) {
            if index.blocks.contains_key(&descriptor.memory_block_id) {
                descriptors.push(descriptor);
            } else {
                tracing::debug!(
                    file = %path.display(),
                    image = %descriptor.name,
                    block = %descriptor.memory_block_id,
                    "Memory block not present, skipping image"
                );
            }
        }

        let infos = descriptors
            .iter()
            .map(|d| ImageInfo {
                name: d.name.clone(),
                channels: d.channels.len(),
                width: d.width() as usize,
                height: d.height() as usize,
                bit_depth: d.channels.first().map_or(8, |c| c.resolution),
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            version,
            descriptors,
            infos,
            blocks: index.blocks,
            metadata: XmlMetadata::from_document(&doc),
        })
    }

    /// Header format version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Read the first plane of one channel of one image
    pub fn read_frame(&self, image: usize, channel: usize) -> AppResult<Frame> {
        let descriptor = self.descriptors.get(image).ok_or_else(|| {
            WatcherError::container(&self.path, format!("no image at index {image}"))
        })?;
        let channel_desc = descriptor.channels.get(channel).ok_or_else(|| {
            WatcherError::container(
                &self.path,
                format!("image '{}' has no channel {channel}", descriptor.name),
            )
        })?;
        let block = self
            .blocks
            .get(&descriptor.memory_block_id)
            .ok_or_else(|| {
                WatcherError::container(
                    &self.path,
                    format!("memory block {} missing", descriptor.memory_block_id),
                )
            })?;

        let width = descriptor.width();
        let height = descriptor.height();
        let bpp = channel_desc.bytes_per_pixel();
        let x_stride = descriptor.x_stride(channel_desc);
        let y_stride = descriptor.y_stride(channel_desc);

        let span = (height - 1)
            .checked_mul(y_stride)
            .and_then(|v| v.checked_add((width - 1).checked_mul(x_stride)?))
            .and_then(|v| v.checked_add(bpp))
            .ok_or_else(|| WatcherError::container(&self.path, "image dimensions overflow"))?;
        let end = channel_desc.bytes_inc.saturating_add(span);
        if end > block.size {
            return Err(WatcherError::container(
                &self.path,
                format!(
                    "channel {channel} of '{}' needs {end} bytes, memory block has {}",
                    descriptor.name, block.size
                ),
            ));
        }

        let span_len = usize::try_from(span)
            .map_err(|_| WatcherError::container(&self.path, "plane too large"))?;
        let mut bytes = vec![0u8; span_len];
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(block.offset + channel_desc.bytes_inc))?;
        file.read_exact(&mut bytes)?;

        let (width, height) = (width as usize, height as usize);
        let (x_stride, y_stride) = (x_stride as usize, y_stride as usize);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let at = y * y_stride + x * x_stride;
                let value = if bpp == 1 {
                    u16::from(bytes[at])
                } else {
                    u16::from_le_bytes([bytes[at], bytes[at + 1]])
                };
                pixels.push(value);
            }
        }
        Frame::new(width, height, pixels)
    }
}

impl ImageContainer for LifFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn images(&self) -> &[ImageInfo] {
        &self.infos
    }

    fn channel_frames(&self, index: usize) -> AppResult<Vec<Frame>> {
        let info = self.infos.get(index).ok_or_else(|| {
            WatcherError::container(&self.path, format!("no image at index {index}"))
        })?;
        (0..info.channels)
            .map(|channel| self.read_frame(index, channel))
            .collect()
    }

    fn metadata(&self) -> &dyn MetadataSource {
        &self.metadata
    }
}

/// Opens `.lif` files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LifOpener;

impl ContainerOpener for LifOpener {
    fn open(&self, path: &Path) -> AppResult<Box<dyn ImageContainer>> {
        Ok(Box::new(LifFile::open(path)?))
    }
}
