//! Binary framing of a LIF file
//!
//! ```text
//! header : u32 magic 0x70 | u32 block length | u8 0x2A | u32 n | n UTF-16LE code units (XML)
//! block  : u32 magic 0x70 | u32 block length | u8 0x2A | memory size (u32 in v1, u64 in v2)
//!          | u8 0x2A | u32 n | n UTF-16LE code units (block id) | memory size bytes of pixels
//! ```
//!
//! All integers are little-endian. Blocks are indexed by id so image descriptors in the
//! XML can be matched to their pixel data without relying on block order.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

/// Magic number at the start of every block
pub const LIF_MAGIC: u32 = 0x70;

/// Separator byte between block fields
pub const LIF_MEMORY_MARKER: u8 = 0x2A;

/// Location of one memory block's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    /// Absolute file offset of the first payload byte
    pub offset: u64,
    /// Payload length in bytes
    pub size: u64,
}

/// Framing error, turned into `WatcherError::Container` by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Magic number mismatch at a block start
    BadMagic {
        /// Offset of the block
        offset: u64,
        /// Value found
        found: u32,
    },
    /// `0x2A` separator missing
    BadMarker {
        /// Offset of the byte
        offset: u64,
    },
    /// Stream ended inside a block header or the XML header
    Truncated {
        /// Offset where data ran out
        offset: u64,
    },
    /// XML header or block id is not valid UTF-16
    BadText,
}

impl std::fmt::Display for FramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingError::BadMagic { offset, found } => write!(
                f,
                "expected LIF magic 0x70 at byte {offset}, found {found:#x} (probably not a LIF file)"
            ),
            FramingError::BadMarker { offset } => {
                write!(f, "expected separator 0x2A at byte {offset}")
            }
            FramingError::Truncated { offset } => {
                write!(f, "file ends at byte {offset} inside a block (still being written?)")
            }
            FramingError::BadText => write!(f, "invalid UTF-16 text"),
        }
    }
}

struct BlockReader<R> {
    inner: R,
    position: u64,
    stream_len: u64,
}

impl<R: Read + Seek> BlockReader<R> {
    fn new(mut inner: R) -> std::io::Result<Self> {
        let position = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;
        Ok(Self {
            inner,
            position,
            stream_len,
        })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FramingError> {
        self.inner.read_exact(buf).map_err(|_| FramingError::Truncated {
            offset: self.position,
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, FramingError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self) -> Result<u32, FramingError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, FramingError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn expect_magic(&mut self) -> Result<(), FramingError> {
        let offset = self.position;
        let found = self.read_u32()?;
        if found != LIF_MAGIC {
            return Err(FramingError::BadMagic { offset, found });
        }
        Ok(())
    }

    fn expect_marker(&mut self) -> Result<(), FramingError> {
        let offset = self.position;
        if self.read_u8()? != LIF_MEMORY_MARKER {
            return Err(FramingError::BadMarker { offset });
        }
        Ok(())
    }

    /// Fails with `Truncated` before allocating when the text would run past the end
    /// of the stream.
    fn read_utf16(&mut self, code_units: u32) -> Result<String, FramingError> {
        let byte_len = u64::from(code_units) * 2;
        if self.position.saturating_add(byte_len) > self.stream_len {
            return Err(FramingError::Truncated {
                offset: self.stream_len,
            });
        }
        let mut bytes = vec![0u8; byte_len as usize];
        self.read_exact(&mut bytes)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| FramingError::BadText)
    }

    fn read_block_header(&mut self, version: u32) -> Result<(u64, String), FramingError> {
        self.expect_magic()?;
        let _block_len = self.read_u32()?;
        self.expect_marker()?;
        let size = if version == 1 {
            u64::from(self.read_u32()?)
        } else {
            self.read_u64()?
        };
        self.expect_marker()?;
        let id_units = self.read_u32()?;
        let id = self.read_utf16(id_units)?;
        Ok((size, id))
    }

    fn skip(&mut self, len: u64, file_len: u64) -> Result<(), FramingError> {
        let target = self.position.saturating_add(len);
        if target > file_len {
            return Err(FramingError::Truncated { offset: file_len });
        }
        self.inner
            .seek(SeekFrom::Start(target))
            .map_err(|_| FramingError::Truncated {
                offset: self.position,
            })?;
        self.position = target;
        Ok(())
    }
}

/// Read the XML header at the start of the stream.
///
/// Leaves the stream positioned at the first memory block.
pub fn read_xml_header<R: Read + Seek>(reader: &mut R) -> Result<String, FramingError> {
    let mut blocks = BlockReader::new(reader).map_err(|_| FramingError::Truncated { offset: 0 })?;
    blocks.expect_magic()?;
    let _block_len = blocks.read_u32()?;
    blocks.expect_marker()?;
    let xml_units = blocks.read_u32()?;
    let xml = blocks.read_utf16(xml_units)?;
    // Headers written by some tools end in a NUL code unit
    Ok(xml.trim_end_matches('\0').to_string())
}

/// Outcome of walking the memory blocks
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    /// Complete blocks by id
    pub blocks: HashMap<String, MemoryBlock>,
    /// Set when the walk stopped at a block that runs past the end of the file
    pub truncated_at: Option<u64>,
}

/// Walk the memory blocks following the XML header.
///
/// `version` is the `LMSDataContainerHeader` version: 1 stores block sizes as `u32`,
/// later versions as `u64`. A block that runs past `file_len` ends the walk and is
/// reported through `truncated_at` instead of failing, since the acquisition software
/// appends blocks while the monitor reads.
pub fn index_memory_blocks<R: Read + Seek>(
    reader: &mut R,
    version: u32,
    file_len: u64,
) -> Result<BlockIndex, FramingError> {
    let mut blocks = BlockReader::new(reader).map_err(|_| FramingError::Truncated { offset: 0 })?;
    let mut index = BlockIndex::default();

    while blocks.position < file_len {
        let block_start = blocks.position;
        let (size, id) = match blocks.read_block_header(version) {
            Ok(header) => header,
            Err(FramingError::Truncated { .. }) => {
                index.truncated_at = Some(block_start);
                break;
            }
            Err(e) => return Err(e),
        };

        let offset = blocks.position;
        if blocks.skip(size, file_len).is_err() {
            index.truncated_at = Some(block_start);
            break;
        }
        index.blocks.insert(id, MemoryBlock { offset, size });
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn header(xml: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let body = utf16(xml);
        out.extend_from_slice(&LIF_MAGIC.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32 + 5).to_le_bytes());
        out.push(LIF_MEMORY_MARKER);
        out.extend_from_slice(&(xml.encode_utf16().count() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn block(id: &str, payload: &[u8], version: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LIF_MAGIC.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(LIF_MEMORY_MARKER);
        if version == 1 {
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        } else {
            out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        }
        out.push(LIF_MEMORY_MARKER);
        out.extend_from_slice(&(id.encode_utf16().count() as u32).to_le_bytes());
        out.extend_from_slice(&utf16(id));
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_header_and_blocks_v2() {
        let mut bytes = header("<LMSDataContainerHeader Version=\"2\"/>");
        let header_len = bytes.len() as u64;
        bytes.extend(block("MemBlock_1", &[1, 2, 3, 4], 2));
        bytes.extend(block("MemBlock_2", &[9; 6], 2));
        let file_len = bytes.len() as u64;

        let mut cursor = Cursor::new(bytes);
        let xml = read_xml_header(&mut cursor).unwrap();
        assert_eq!(xml, "<LMSDataContainerHeader Version=\"2\"/>");
        assert_eq!(cursor.position(), header_len);

        let index = index_memory_blocks(&mut cursor, 2, file_len).unwrap();
        assert_eq!(index.truncated_at, None);
        assert_eq!(index.blocks.len(), 2);
        assert_eq!(index.blocks["MemBlock_1"].size, 4);
        assert_eq!(index.blocks["MemBlock_2"].size, 6);
    }

    #[test]
    fn test_version_one_sizes() {
        let mut bytes = header("<x/>");
        bytes.extend(block("MemBlock_7", &[5; 3], 1));
        let file_len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        read_xml_header(&mut cursor).unwrap();
        let index = index_memory_blocks(&mut cursor, 1, file_len).unwrap();
        assert_eq!(index.blocks["MemBlock_7"].size, 3);
    }

    #[test]
    fn test_truncated_block_stops_walk() {
        let mut bytes = header("<x/>");
        bytes.extend(block("MemBlock_1", &[1; 4], 2));
        let mut partial = block("MemBlock_2", &[2; 100], 2);
        partial.truncate(partial.len() - 50);
        bytes.extend(partial);
        let file_len = bytes.len() as u64;

        let mut cursor = Cursor::new(bytes);
        read_xml_header(&mut cursor).unwrap();
        let index = index_memory_blocks(&mut cursor, 2, file_len).unwrap();
        assert_eq!(index.blocks.len(), 1);
        assert!(index.truncated_at.is_some());
    }

    #[test]
    fn test_bad_magic() {
        let mut cursor = Cursor::new(vec![0u8; 32]);
        assert!(matches!(
            read_xml_header(&mut cursor),
            Err(FramingError::BadMagic { offset: 0, found: 0 })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut bytes = header("<LMSDataContainerHeader/>");
        bytes.truncate(20);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_xml_header(&mut cursor),
            Err(FramingError::Truncated { .. })
        ));
    }

    #[test]
    fn test_oversized_text_length_is_truncation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LIF_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(LIF_MEMORY_MARKER);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[b'<', 0, b'x', 0]);
        let file_len = bytes.len() as u64;

        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_xml_header(&mut cursor),
            Err(FramingError::Truncated { offset }) if offset == file_len
        ));
    }

    #[test]
    fn test_oversized_block_id_ends_walk() {
        let mut bytes = header("<x/>");
        let block_start = bytes.len() as u64;
        bytes.extend_from_slice(&LIF_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(LIF_MEMORY_MARKER);
        bytes.extend_from_slice(&4u64.to_le_bytes());
        bytes.push(LIF_MEMORY_MARKER);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let file_len = bytes.len() as u64;

        let mut cursor = Cursor::new(bytes);
        read_xml_header(&mut cursor).unwrap();
        let index = index_memory_blocks(&mut cursor, 2, file_len).unwrap();
        assert!(index.blocks.is_empty());
        assert_eq!(index.truncated_at, Some(block_start));
    }
}
