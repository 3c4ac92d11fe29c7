//! Output band to codestream component mapping.

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Meaning of a channel in a channel definition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Color channel, backed by the associated component.
    Color,
    /// Opacity channel.
    Opacity,
    /// Premultiplied opacity channel.
    PremultipliedOpacity,
    /// Unspecified channel type.
    Unspecified,
}

impl ChannelType {
    /// Decode the raw `cdef` type value.
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Color),
            1 => Some(Self::Opacity),
            2 => Some(Self::PremultipliedOpacity),
            0xFFFF => Some(Self::Unspecified),
            _ => None,
        }
    }
}

/// One `(type, channel, component)` entry of a channel definition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAssociation {
    /// Channel type.
    pub channel_type: ChannelType,
    /// Channel (output band) index.
    pub channel: usize,
    /// Zero-based codestream component backing the channel.
    pub component: usize,
}

impl ChannelAssociation {
    /// Create an association entry.
    pub fn new(channel_type: ChannelType, channel: usize, component: usize) -> Self {
        Self {
            channel_type,
            channel,
            component,
        }
    }

    /// Decode a raw `cdef` box triple, whose association is 1-based.
    pub fn from_cdef(channel_type: u16, channel: u16, association: u16) -> Result<Self> {
        let kind = ChannelType::from_raw(channel_type).ok_or_else(|| {
            ReaderError::ChannelDefinition(format!(
                "Unknown channel type {} for channel {}",
                channel_type, channel
            ))
        })?;

        let component = match kind {
            ChannelType::Color => {
                if association == 0 || association == 0xFFFF {
                    return Err(ReaderError::ChannelDefinition(format!(
                        "Color channel {} has no component association ({})",
                        channel, association
                    )));
                }
                association as usize - 1
            }
            _ => channel as usize,
        };

        Ok(Self::new(kind, channel as usize, component))
    }
}

/// Resolved band-to-component map for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    components: Vec<usize>,
}

impl ChannelMap {
    /// Identity map over `num_components` components.
    pub fn identity(num_components: usize) -> Self {
        Self {
            components: (0..num_components).collect(),
        }
    }

    /// Build the map from an optional association table.
    ///
    /// Color entries redirect their channel to the associated component;
    /// opacity and unspecified entries map a channel to itself. With a
    /// palette present the table is ignored.
    pub fn new(
        num_components: usize,
        table: Option<&[ChannelAssociation]>,
        has_palette: bool,
    ) -> Result<Self> {
        let mut map = Self::identity(num_components);

        let table = match table {
            Some(table) if !has_palette => table,
            _ => return Ok(map),
        };

        for entry in table {
            if entry.channel >= num_components {
                return Err(ReaderError::ChannelDefinition(format!(
                    "Channel {} out of range (image has {} components)",
                    entry.channel, num_components
                )));
            }

            map.components[entry.channel] = match entry.channel_type {
                ChannelType::Color => {
                    if entry.component >= num_components {
                        return Err(ReaderError::ChannelDefinition(format!(
                            "Channel {} associated with missing component {}",
                            entry.channel, entry.component
                        )));
                    }
                    entry.component
                }
                _ => entry.channel,
            };
        }

        Ok(map)
    }

    /// Codestream component backing an output band.
    pub fn component_for(&self, band: usize) -> usize {
        self.components.get(band).copied().unwrap_or(band)
    }

    /// Whether every band maps to its own component.
    pub fn is_identity(&self) -> bool {
        self.components.iter().enumerate().all(|(i, &c)| i == c)
    }
}
