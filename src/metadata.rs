//! Channel metadata lookups
//!
//! The LIF XML header describes every image as an `Element` node. Two pieces of it
//! matter for the monitor:
//!
//! - the dye of each channel, stored as `ChannelProperty` key/value pairs with the
//!   key `DyeName`, used as the panel title;
//! - the acquisition time of each channel, stored in a `TimeStampList`, used to find
//!   the most recent image in a multi-image file.
//!
//! Lookups go through the [`MetadataSource`] trait so the selection and rendering code
//! can be tested without real files. The fallible lookups return [`LookupError`] which
//! separates "no such image" from "image found but field missing"; the convenience
//! lookups fall back to the image name (label) or `None` (timestamp) instead.

use std::collections::HashMap;
use std::fmt;

use roxmltree::{Document, Node};

use crate::error::AppResult;
use crate::timestamp::{filetime_from_parts, parse_hex_float};

/// Why a metadata lookup came back empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No `Element` node with this name
    ImageNotFound(String),
    /// Element exists but carries no entries for the field
    FieldMissing {
        /// Image name
        image: String,
        /// Field that was looked up (`dye`, `timestamp`)
        field: &'static str,
    },
    /// Element has entries for the field, but fewer than the requested channel
    IndexOutOfRange {
        /// Image name
        image: String,
        /// Field that was looked up
        field: &'static str,
        /// Requested channel index
        index: usize,
        /// Number of entries present
        len: usize,
    },
    /// Field is present but could not be decoded
    Malformed {
        /// Image name
        image: String,
        /// Field that was looked up
        field: &'static str,
        /// Offending text
        value: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::ImageNotFound(image) => write!(f, "no metadata element named '{image}'"),
            LookupError::FieldMissing { image, field } => {
                write!(f, "'{image}' has no {field} entries")
            }
            LookupError::IndexOutOfRange {
                image,
                field,
                index,
                len,
            } => write!(
                f,
                "'{image}' has {len} {field} entries, channel {index} requested"
            ),
            LookupError::Malformed {
                image,
                field,
                value,
            } => write!(f, "'{image}' has malformed {field} '{value}'"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Query interface over a container's metadata
pub trait MetadataSource {
    /// Dye name of a channel
    fn dye_name(&self, image: &str, channel: usize) -> Result<String, LookupError>;

    /// Acquisition timestamp of a channel (FILETIME ticks)
    fn timestamp(&self, image: &str, channel: usize) -> Result<f64, LookupError>;

    /// Panel label: the dye name, or the image name when no dye is recorded.
    fn lookup_label(&self, image: &str, channel: usize) -> String {
        match self.dye_name(image, channel) {
            Ok(dye) => dye,
            Err(e) => {
                tracing::debug!(image, channel, reason = %e, "No dye name, using image name");
                image.to_string()
            }
        }
    }

    /// Timestamp if one is recorded and decodable.
    fn lookup_timestamp(&self, image: &str, channel: usize) -> Option<f64> {
        match self.timestamp(image, channel) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::debug!(image, channel, reason = %e, "No acquisition timestamp");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ElementMetadata {
    dyes: Vec<String>,
    timestamps: TimestampField,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum TimestampField {
    #[default]
    Missing,
    Values(Vec<f64>),
    Malformed(String),
}

/// Metadata indexed from a LIF XML header.
///
/// The XML is parsed once when the container is opened; lookups afterwards are map
/// accesses. When several elements share a name the first one in document order wins.
#[derive(Debug, Clone, Default)]
pub struct XmlMetadata {
    elements: HashMap<String, ElementMetadata>,
}

impl XmlMetadata {
    /// Parse and index an XML header
    pub fn parse(xml: &str) -> AppResult<Self> {
        let doc = Document::parse(xml)?;
        Ok(Self::from_document(&doc))
    }

    /// Index an already parsed header
    pub fn from_document(doc: &Document<'_>) -> Self {
        let mut elements = HashMap::new();

        for node in doc.descendants().filter(|n| n.has_tag_name("Element")) {
            let Some(name) = node.attribute("Name") else {
                continue;
            };
            if elements.contains_key(name) {
                continue;
            }
            elements.insert(name.to_string(), index_element(node));
        }

        Self { elements }
    }

    /// Number of named elements found
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no named element was found
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn element(&self, image: &str) -> Result<&ElementMetadata, LookupError> {
        self.elements
            .get(image)
            .ok_or_else(|| LookupError::ImageNotFound(image.to_string()))
    }
}

fn index_element(element: Node<'_, '_>) -> ElementMetadata {
    let dyes = element
        .descendants()
        .filter(|n| {
            n.has_tag_name("ChannelProperty")
                && n.parent_element()
                    .is_some_and(|p| p.has_tag_name("ChannelDescription"))
        })
        .filter_map(dye_from_property)
        .collect();

    let timestamps = element
        .descendants()
        .find(|n| n.has_tag_name("TimeStampList"))
        .map(timestamps_from_list)
        .unwrap_or_default();

    ElementMetadata { dyes, timestamps }
}

/// `<ChannelProperty><Key>DyeName</Key><Value>DAPI</Value></ChannelProperty>`
fn dye_from_property(property: Node<'_, '_>) -> Option<String> {
    let children: Vec<Node<'_, '_>> = property.children().filter(Node::is_element).collect();
    let is_dye = children
        .iter()
        .any(|c| c.text().map(str::trim) == Some("DyeName"));
    if !is_dye {
        return None;
    }
    let value = children
        .iter()
        .find(|c| c.has_tag_name("Value"))
        .or_else(|| children.get(1))?;
    Some(value.text().map(str::trim).unwrap_or_default().to_string())
}

fn timestamps_from_list(list: Node<'_, '_>) -> TimestampField {
    let text = list.text().map(str::trim).unwrap_or_default();
    if !text.is_empty() {
        let mut values = Vec::new();
        for token in text.split_whitespace() {
            match parse_hex_float(token) {
                Some(v) => values.push(v),
                None => return TimestampField::Malformed(token.to_string()),
            }
        }
        return TimestampField::Values(values);
    }

    // Older headers: <TimeStamp HighInteger=".." LowInteger=".."/>
    let mut values = Vec::new();
    for stamp in list.children().filter(|n| n.has_tag_name("TimeStamp")) {
        let high = stamp.attribute("HighInteger").and_then(|v| v.parse::<u32>().ok());
        let low = stamp.attribute("LowInteger").and_then(|v| v.parse::<u32>().ok());
        match (high, low) {
            (Some(high), Some(low)) => values.push(filetime_from_parts(high, low)),
            _ => {
                let raw = format!(
                    "HighInteger={:?} LowInteger={:?}",
                    stamp.attribute("HighInteger"),
                    stamp.attribute("LowInteger")
                );
                return TimestampField::Malformed(raw);
            }
        }
    }
    if values.is_empty() {
        TimestampField::Missing
    } else {
        TimestampField::Values(values)
    }
}

impl MetadataSource for XmlMetadata {
    fn dye_name(&self, image: &str, channel: usize) -> Result<String, LookupError> {
        let element = self.element(image)?;
        if element.dyes.is_empty() {
            return Err(LookupError::FieldMissing {
                image: image.to_string(),
                field: "dye",
            });
        }
        element
            .dyes
            .get(channel)
            .cloned()
            .ok_or(LookupError::IndexOutOfRange {
                image: image.to_string(),
                field: "dye",
                index: channel,
                len: element.dyes.len(),
            })
    }

    fn timestamp(&self, image: &str, channel: usize) -> Result<f64, LookupError> {
        let element = self.element(image)?;
        match &element.timestamps {
            TimestampField::Missing => Err(LookupError::FieldMissing {
                image: image.to_string(),
                field: "timestamp",
            }),
            TimestampField::Malformed(value) => Err(LookupError::Malformed {
                image: image.to_string(),
                field: "timestamp",
                value: value.clone(),
            }),
            TimestampField::Values(values) => {
                values
                    .get(channel)
                    .copied()
                    .ok_or(LookupError::IndexOutOfRange {
                        image: image.to_string(),
                        field: "timestamp",
                        index: channel,
                        len: values.len(),
                    })
            }
        }
    }
}

/// Metadata held in plain maps, for tests and synthetic containers.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    dyes: HashMap<String, Vec<String>>,
    timestamps: HashMap<String, Vec<f64>>,
}

impl StaticMetadata {
    /// Empty metadata: every lookup reports `ImageNotFound`
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dye names of an image
    pub fn with_dyes<S: Into<String>>(
        mut self,
        image: &str,
        dyes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.dyes
            .insert(image.to_string(), dyes.into_iter().map(Into::into).collect());
        self
    }

    /// Set the per-channel timestamps of an image
    pub fn with_timestamps(
        mut self,
        image: &str,
        timestamps: impl IntoIterator<Item = f64>,
    ) -> Self {
        self.timestamps
            .insert(image.to_string(), timestamps.into_iter().collect());
        self
    }

    fn known(&self, image: &str) -> bool {
        self.dyes.contains_key(image) || self.timestamps.contains_key(image)
    }
}

impl MetadataSource for StaticMetadata {
    fn dye_name(&self, image: &str, channel: usize) -> Result<String, LookupError> {
        if !self.known(image) {
            return Err(LookupError::ImageNotFound(image.to_string()));
        }
        let dyes = self.dyes.get(image).ok_or(LookupError::FieldMissing {
            image: image.to_string(),
            field: "dye",
        })?;
        dyes.get(channel).cloned().ok_or(LookupError::IndexOutOfRange {
            image: image.to_string(),
            field: "dye",
            index: channel,
            len: dyes.len(),
        })
    }

    fn timestamp(&self, image: &str, channel: usize) -> Result<f64, LookupError> {
        if !self.known(image) {
            return Err(LookupError::ImageNotFound(image.to_string()));
        }
        let times = self.timestamps.get(image).ok_or(LookupError::FieldMissing {
            image: image.to_string(),
            field: "timestamp",
        })?;
        times.get(channel).copied().ok_or(LookupError::IndexOutOfRange {
            image: image.to_string(),
            field: "timestamp",
            index: channel,
            len: times.len(),
        })
    }
}
