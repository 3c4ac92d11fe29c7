//! Sample layout resolution and the advisory color description.

use serde::Serialize;

use crate::error::{ReaderError, Result};

/// In-memory sample storage of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SampleKind {
    /// Single band, `bits` per pixel packed MSB-first, rows byte aligned.
    ///
    /// Fields hold unsigned bit patterns. Signed samples are stored as
    /// their two's complement truncated to `bits`, so `-8` in a 4-bit
    /// field reads back as `8`.
    Packed {
        /// Bits per pixel: 1, 2 or 4.
        bits: u8,
    },
    /// One byte per sample, bands interleaved.
    ///
    /// Like [`SampleKind::Packed`], bytes are unsigned bit patterns.
    Byte,
    /// One 16-bit unit per sample, bands interleaved.
    Short {
        /// Whether samples are signed.
        signed: bool,
    },
    /// One 32-bit unit per sample, bands interleaved.
    Int,
}

/// Layout chosen once per read and carried through the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutDescriptor {
    /// Storage kind.
    pub kind: SampleKind,
    /// Number of bands.
    pub bands: usize,
}

impl LayoutDescriptor {
    /// Pick the storage for `num_bands` bands of at most `max_bit_depth`
    /// bits.
    ///
    /// Single-band 1, 2 and 4 bit images pack; otherwise the narrowest of
    /// byte, short and int that holds the depth is used. Depths above 32
    /// are unsupported.
    pub fn resolve(num_bands: usize, max_bit_depth: u32, is_signed: bool) -> Result<Self> {
        if num_bands == 0 {
            return Err(ReaderError::InvalidRequest(
                "Cannot resolve a layout without bands".into(),
            ));
        }

        let kind = match max_bit_depth {
            0 => return Err(ReaderError::UnsupportedBitDepth(0)),
            1 | 2 | 4 if num_bands == 1 => SampleKind::Packed {
                bits: max_bit_depth as u8,
            },
            1..=8 => SampleKind::Byte,
            9..=16 => SampleKind::Short { signed: is_signed },
            17..=32 => SampleKind::Int,
            _ => return Err(ReaderError::UnsupportedBitDepth(max_bit_depth)),
        };

        Ok(Self {
            kind,
            bands: num_bands,
        })
    }

    /// One bit per sample, single band.
    pub fn is_bilevel(&self) -> bool {
        self.kind == SampleKind::Packed { bits: 1 }
    }

    /// Storage bits per sample.
    pub fn bits_per_sample(&self) -> u32 {
        match self.kind {
            SampleKind::Packed { bits } => bits as u32,
            SampleKind::Byte => 8,
            SampleKind::Short { .. } => 16,
            SampleKind::Int => 32,
        }
    }

    /// Storage elements per row: bytes for packed layouts, samples
    /// otherwise.
    pub fn row_stride(&self, width: u32) -> usize {
        match self.kind {
            SampleKind::Packed { bits } => (width as usize * bits as usize + 7) / 8,
            _ => width as usize * self.bands,
        }
    }
}

/// Shorthand for [`LayoutDescriptor::resolve`].
pub fn resolve_sample_layout(
    num_bands: usize,
    max_bit_depth: u32,
    is_signed: bool,
) -> Result<LayoutDescriptor> {
    LayoutDescriptor::resolve(num_bands, max_bit_depth, is_signed)
}

/// How a caller should interpret the bands of a raster.
///
/// Advisory only; decoding never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum ColorDescription {
    /// Packed single band read through a gray palette of `2^bits` entries.
    GrayRamp {
        /// Bits per pixel.
        bits: u8,
    },
    /// Single intensity band.
    Gray,
    /// Intensity plus alpha.
    GrayAlpha,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Linear components without a color interpretation.
    Components {
        /// Number of bands.
        bands: usize,
    },
}

impl ColorDescription {
    /// Default interpretation of a layout.
    pub fn for_layout(layout: &LayoutDescriptor) -> Self {
        match (layout.kind, layout.bands) {
            (SampleKind::Packed { bits }, _) => Self::GrayRamp { bits },
            (_, 1) => Self::Gray,
            (_, 2) => Self::GrayAlpha,
            (_, 3) => Self::Rgb,
            (_, 4) => Self::Rgba,
            (_, bands) => Self::Components { bands },
        }
    }

    /// Gray palette for packed layouts, black to white.
    pub fn palette(&self) -> Option<Vec<u8>> {
        match *self {
            Self::GrayRamp { bits } => {
                let top = (1u32 << bits) - 1;
                Some((0..=top).map(|i| (i * 255 / top) as u8).collect())
            }
            _ => None,
        }
    }

    /// Whether the last band is an alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::GrayAlpha | Self::Rgba)
    }
}
