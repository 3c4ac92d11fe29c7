//! Codestream header data consumed by the reader.
//!
//! The marker parser that fills these structures lives outside this crate;
//! the reader only needs the tiling, per-component sample format and the
//! optional channel definition table.

mod channel;

pub use channel::{ChannelAssociation, ChannelMap, ChannelType};

use serde::{Deserialize, Serialize};

fn one() -> u32 {
    1
}

/// Sample format of one codestream component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Original bit depth of the component.
    pub bit_depth: u32,
    /// Whether the original samples are signed.
    #[serde(default)]
    pub signed: bool,
    /// Number of fixed-point fraction bits in decoded samples.
    #[serde(default)]
    pub fraction_bits: u32,
    /// Horizontal subsampling relative to the reference grid.
    #[serde(default = "one")]
    pub subsampling_x: u32,
    /// Vertical subsampling relative to the reference grid.
    #[serde(default = "one")]
    pub subsampling_y: u32,
}

impl ComponentInfo {
    /// An unsigned component without subsampling.
    pub fn unsigned(bit_depth: u32) -> Self {
        Self {
            bit_depth,
            signed: false,
            fraction_bits: 0,
            subsampling_x: 1,
            subsampling_y: 1,
        }
    }

    /// A signed component without subsampling.
    pub fn signed(bit_depth: u32) -> Self {
        Self {
            signed: true,
            ..Self::unsigned(bit_depth)
        }
    }

    /// Set the fixed-point fraction bit count.
    pub fn with_fraction_bits(mut self, fraction_bits: u32) -> Self {
        self.fraction_bits = fraction_bits;
        self
    }

    /// Set the component subsampling factors.
    pub fn with_subsampling(mut self, x: u32, y: u32) -> Self {
        self.subsampling_x = x;
        self.subsampling_y = y;
        self
    }
}

/// Main header values on the reference grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodestreamHeader {
    /// Image upper-left corner on the reference grid.
    #[serde(default)]
    pub image_x0: u32,
    /// Image upper-left corner on the reference grid.
    #[serde(default)]
    pub image_y0: u32,
    /// Image width on the reference grid.
    pub width: u32,
    /// Image height on the reference grid.
    pub height: u32,
    /// Tile grid origin.
    #[serde(default)]
    pub tile_x0: u32,
    /// Tile grid origin.
    #[serde(default)]
    pub tile_y0: u32,
    /// Nominal tile width.
    pub tile_width: u32,
    /// Nominal tile height.
    pub tile_height: u32,
    /// One entry per codestream component.
    pub components: Vec<ComponentInfo>,
    /// Optional channel definition table.
    #[serde(default)]
    pub channel_definitions: Option<Vec<ChannelAssociation>>,
    /// A palette is declared; channel definitions then describe palette
    /// outputs and are not applied to components.
    #[serde(default)]
    pub has_palette: bool,
}

impl CodestreamHeader {
    /// Header for an image split into `tile_width` x `tile_height` tiles
    /// anchored at the origin.
    pub fn tiled(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        components: Vec<ComponentInfo>,
    ) -> Self {
        Self {
            image_x0: 0,
            image_y0: 0,
            width,
            height,
            tile_x0: 0,
            tile_y0: 0,
            tile_width,
            tile_height,
            components,
            channel_definitions: None,
            has_palette: false,
        }
    }

    /// Header for an untiled image.
    pub fn single_tile(width: u32, height: u32, components: Vec<ComponentInfo>) -> Self {
        Self::tiled(width, height, width, height, components)
    }

    /// Attach a channel definition table.
    pub fn with_channel_definitions(mut self, table: Vec<ChannelAssociation>) -> Self {
        self.channel_definitions = Some(table);
        self
    }

    /// Number of codestream components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Largest original bit depth over all components.
    pub fn max_bit_depth(&self) -> u32 {
        self.components
            .iter()
            .map(|c| c.bit_depth)
            .max()
            .unwrap_or(0)
    }
}
