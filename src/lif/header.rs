//! Image descriptors in the LIF XML header
//!
//! Every `Element` with a `Data/Image` child and a non-empty `Memory` child is an
//! image. Its `ImageDescription` lists the channels (bit depth, byte offset inside
//! the memory block) and the dimensions (element count and byte stride per axis).

use roxmltree::{Document, Node};

/// Dimension ids used by `DimensionDescription@DimID`
pub mod dim {
    /// Columns
    pub const X: u32 = 1;
    /// Rows
    pub const Y: u32 = 2;
}

/// One channel of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Bits per pixel (`Resolution`)
    pub resolution: u32,
    /// Byte offset of the channel's first pixel inside the memory block
    pub bytes_inc: u64,
}

impl ChannelDescriptor {
    /// Bytes per stored pixel
    pub fn bytes_per_pixel(&self) -> u64 {
        if self.resolution <= 8 {
            1
        } else {
            2
        }
    }
}

/// One axis of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionDescriptor {
    /// Axis id (1 = x, 2 = y, 3 = z, 4 = t, 10 = tile)
    pub id: u32,
    /// Number of samples along the axis
    pub count: u64,
    /// Byte stride between consecutive samples
    pub bytes_inc: u64,
}

/// Layout of one image as described by the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// `Element@Name`
    pub name: String,
    /// Memory block holding the pixels
    pub memory_block_id: String,
    /// Declared memory block size
    pub memory_size: u64,
    /// Channels in order
    pub channels: Vec<ChannelDescriptor>,
    /// Axes in header order
    pub dimensions: Vec<DimensionDescriptor>,
}

impl ImageDescriptor {
    fn dimension(&self, id: u32) -> Option<&DimensionDescriptor> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    /// Columns (1 if the header has no x axis)
    pub fn width(&self) -> u64 {
        self.dimension(dim::X).map_or(1, |d| d.count.max(1))
    }

    /// Rows (1 for line scans)
    pub fn height(&self) -> u64 {
        self.dimension(dim::Y).map_or(1, |d| d.count.max(1))
    }

    /// Byte stride between neighbouring pixels in a row
    pub fn x_stride(&self, channel: &ChannelDescriptor) -> u64 {
        self.dimension(dim::X)
            .map(|d| d.bytes_inc)
            .filter(|&inc| inc > 0)
            .unwrap_or_else(|| channel.bytes_per_pixel())
    }

    /// Byte stride between rows
    pub fn y_stride(&self, channel: &ChannelDescriptor) -> u64 {
        self.dimension(dim::Y)
            .map(|d| d.bytes_inc)
            .filter(|&inc| inc > 0)
            .unwrap_or_else(|| self.width() * self.x_stride(channel))
    }
}

/// `LMSDataContainerHeader@Version`, defaulting to 2 when absent or unparsable.
pub fn container_version(doc: &Document<'_>) -> u32 {
    doc.root_element()
        .attribute("Version")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(2)
}

/// All images in document order. Elements whose memory is empty are skipped.
pub fn image_descriptors(doc: &Document<'_>) -> Vec<ImageDescriptor> {
    doc.descendants()
        .filter(|n| n.has_tag_name("Element"))
        .filter_map(describe_image)
        .collect()
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn attr_u64(node: Node<'_, '_>, name: &str) -> Option<u64> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

fn describe_image(element: Node<'_, '_>) -> Option<ImageDescriptor> {
    let name = element.attribute("Name")?;
    let image = child(child(element, "Data")?, "Image")?;
    let memory = child(element, "Memory")?;
    let memory_size = attr_u64(memory, "Size")?;
    if memory_size == 0 {
        return None;
    }
    let memory_block_id = memory.attribute("MemoryBlockID")?.to_string();

    let description = child(image, "ImageDescription")?;
    let channels = child(description, "Channels")
        .map(|channels| {
            channels
                .children()
                .filter(|c| c.has_tag_name("ChannelDescription"))
                .map(|c| ChannelDescriptor {
                    resolution: attr_u64(c, "Resolution").unwrap_or(8) as u32,
                    bytes_inc: attr_u64(c, "BytesInc").unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();
    let dimensions = child(description, "Dimensions")
        .map(|dims| {
            dims.children()
                .filter(|d| d.has_tag_name("DimensionDescription"))
                .filter_map(|d| {
                    Some(DimensionDescriptor {
                        id: attr_u64(d, "DimID")? as u32,
                        count: attr_u64(d, "NumberOfElements").unwrap_or(1),
                        bytes_inc: attr_u64(d, "BytesInc").unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ImageDescriptor {
        name: name.to_string(),
        memory_block_id,
        memory_size,
        channels,
        dimensions,
    })
}
