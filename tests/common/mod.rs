//! Shared helpers for integration tests
//!
//! - [`LifBuilder`]: writes small but well-formed LIF files to disk
//! - [`RecordingSink`]: a `FrameSink` that keeps everything it is given
//! - [`set_mtime`]: pins a file's modification time
#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use lif_watch::error::AppResult;
use lif_watch::render::{FrameSink, FrameView};

const MAGIC: u32 = 0x70;
const MARKER: u8 = 0x2A;

/// FILETIME ticks for 2020-01-01T00:00:00Z
pub const TICKS_2020: u64 = 132_223_104_000_000_000;

/// One image to be written
#[derive(Debug, Clone)]
pub struct TestImage {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// 8 or 16
    pub bit_depth: u32,
    /// One plane per channel, row-major
    pub channels: Vec<Vec<u16>>,
    pub dyes: Vec<String>,
    /// FILETIME ticks per channel
    pub timestamps: Vec<u64>,
}

impl TestImage {
    /// 8-bit image with `channels` planes all set to `value`
    pub fn uniform(name: &str, width: usize, height: usize, channels: usize, value: u16) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bit_depth: 8,
            channels: vec![vec![value; width * height]; channels],
            dyes: Vec::new(),
            timestamps: Vec::new(),
        }
    }

    pub fn with_channel(mut self, index: usize, pixels: Vec<u16>) -> Self {
        self.channels[index] = pixels;
        self
    }

    pub fn with_dyes(mut self, dyes: &[&str]) -> Self {
        self.dyes = dyes.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_timestamps(mut self, ticks: &[u64]) -> Self {
        self.timestamps = ticks.to_vec();
        self
    }

    pub fn sixteen_bit(mut self) -> Self {
        self.bit_depth = 16;
        self
    }

    fn bytes_per_pixel(&self) -> usize {
        if self.bit_depth > 8 {
            2
        } else {
            1
        }
    }

    fn plane_bytes(&self) -> usize {
        self.width * self.height * self.bytes_per_pixel()
    }

    fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.plane_bytes() * self.channels.len());
        for plane in &self.channels {
            for &value in plane {
                if self.bytes_per_pixel() == 1 {
                    out.push(value as u8);
                } else {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        out
    }

    fn xml(&self, block_id: &str) -> String {
        let bpp = self.bytes_per_pixel();
        let mut channels = String::new();
        for c in 0..self.channels.len() {
            let dye = self
                .dyes
                .get(c)
                .map(|d| {
                    format!(
                        "<ChannelProperty><Key>DyeName</Key><Value>{d}</Value></ChannelProperty>"
                    )
                })
                .unwrap_or_default();
            channels.push_str(&format!(
                r#"<ChannelDescription Resolution="{}" BytesInc="{}">{dye}</ChannelDescription>"#,
                self.bit_depth,
                c * self.plane_bytes()
            ));
        }
        let timestamps = if self.timestamps.is_empty() {
            String::new()
        } else {
            let list: Vec<String> = self.timestamps.iter().map(|t| format!("{t:x}")).collect();
            format!(
                r#"<TimeStampList NumberOfTimeStamps="{}">{}</TimeStampList>"#,
                list.len(),
                list.join(" ")
            )
        };
        format!(
            r#"<Element Name="{name}"><Data><Image><ImageDescription><Channels>{channels}</Channels><Dimensions><DimensionDescription DimID="1" NumberOfElements="{w}" BytesInc="{bpp}"/><DimensionDescription DimID="2" NumberOfElements="{h}" BytesInc="{row}"/></Dimensions></ImageDescription>{timestamps}</Image></Data><Memory Size="{size}" MemoryBlockID="{block_id}"/></Element>"#,
            name = self.name,
            w = self.width,
            h = self.height,
            row = self.width * bpp,
            size = self.plane_bytes() * self.channels.len(),
        )
    }
}

/// Builds LIF file bytes
#[derive(Debug, Clone, Default)]
pub struct LifBuilder {
    version: u32,
    images: Vec<TestImage>,
}

impl LifBuilder {
    pub fn new() -> Self {
        Self {
            version: 2,
            images: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn image(mut self, image: TestImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut children = String::new();
        for (i, image) in self.images.iter().enumerate() {
            children.push_str(&image.xml(&block_id(i)));
        }
        let xml = format!(
            r#"<LMSDataContainerHeader Version="{}"><Element Name="project"><Memory Size="0" MemoryBlockID="MemBlock_0"/><Children>{children}</Children></Element></LMSDataContainerHeader>"#,
            self.version
        );

        let mut out = Vec::new();
        let units: Vec<u8> = xml.encode_utf16().flat_map(u16::to_le_bytes).collect();
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&(units.len() as u32 + 5).to_le_bytes());
        out.push(MARKER);
        out.extend_from_slice(&(xml.encode_utf16().count() as u32).to_le_bytes());
        out.extend_from_slice(&units);

        for (i, image) in self.images.iter().enumerate() {
            let id = block_id(i);
            let payload = image.payload();
            out.extend_from_slice(&MAGIC.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.push(MARKER);
            if self.version == 1 {
                out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            } else {
                out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            }
            out.push(MARKER);
            out.extend_from_slice(&(id.encode_utf16().count() as u32).to_le_bytes());
            out.extend(id.encode_utf16().flat_map(u16::to_le_bytes));
            out.extend_from_slice(&payload);
        }
        out
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.bytes()).unwrap();
    }
}

fn block_id(index: usize) -> String {
    format!("MemBlock_{}", index + 1)
}

/// Set the modification time of `path` to `secs` after the Unix epoch
pub fn set_mtime(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Keeps every presented batch of figures
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub presented: Vec<Vec<FrameView>>,
}

impl RecordingSink {
    pub fn last(&self) -> &[FrameView] {
        self.presented.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn shown_titles(&self) -> Vec<String> {
        self.presented
            .iter()
            .flat_map(|views| views.iter().map(FrameView::title))
            .collect()
    }
}

impl FrameSink for RecordingSink {
    fn present(&mut self, views: Vec<FrameView>) -> AppResult<()> {
        self.presented.push(views);
        Ok(())
    }
}
