//! Output rasters.
//!
//! A [`Raster`] owns its samples in the storage picked by a
//! [`LayoutDescriptor`]. The reader only ever writes rows into it.

mod export;
mod layout;

pub use layout::{resolve_sample_layout, ColorDescription, LayoutDescriptor, SampleKind};

use crate::config::{Point, Rect};
use crate::error::{ReaderError, Result};
use crate::normalize::pack_bilevel_row;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RasterData {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Ints(Vec<i32>),
}

/// A rectangle of samples in a fixed layout.
///
/// Coordinates passed to the accessors are absolute: the raster covers
/// `bounds()`, which starts at its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    layout: LayoutDescriptor,
    origin: Point,
    width: u32,
    height: u32,
    stride: usize,
    data: RasterData,
}

impl Raster {
    /// Allocate a zero-filled raster anchored at the origin.
    pub fn new(layout: LayoutDescriptor, width: u32, height: u32) -> Result<Self> {
        let stride = layout.row_stride(width);
        let len = stride.checked_mul(height as usize).ok_or_else(|| {
            ReaderError::Raster(format!("Raster {}x{} is too large", width, height))
        })?;

        let data = match layout.kind {
            SampleKind::Packed { .. } | SampleKind::Byte => RasterData::Bytes(vec![0; len]),
            SampleKind::Short { .. } => RasterData::Shorts(vec![0; len]),
            SampleKind::Int => RasterData::Ints(vec![0; len]),
        };

        Ok(Self {
            layout,
            origin: Point::default(),
            width,
            height,
            stride,
            data,
        })
    }

    /// Move the raster's origin.
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// Sample layout.
    pub fn layout(&self) -> &LayoutDescriptor {
        &self.layout
    }

    /// Covered rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.origin.x, self.origin.y, self.width, self.height)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bands.
    pub fn bands(&self) -> usize {
        self.layout.bands
    }

    /// Storage elements per row.
    pub fn row_stride(&self) -> usize {
        self.stride
    }

    /// Byte storage (packed and byte layouts).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            RasterData::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// 16-bit storage; signed layouts hold two's complement bit patterns.
    pub fn as_shorts(&self) -> Option<&[u16]> {
        match &self.data {
            RasterData::Shorts(v) => Some(v),
            _ => None,
        }
    }

    /// 32-bit storage.
    pub fn as_ints(&self) -> Option<&[i32]> {
        match &self.data {
            RasterData::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// Validate a row write and return the local `(column, row)`.
    fn locate(&self, x: u32, y: u32, len: usize, band: usize) -> Result<(usize, usize)> {
        let bounds = self.bounds();
        if band >= self.bands()
            || !bounds.contains(x, y)
            || x as u64 + len as u64 > bounds.right()
        {
            return Err(ReaderError::Raster(format!(
                "Write of {} samples at ({}, {}) band {} outside raster {} with {} bands",
                len,
                x,
                y,
                band,
                bounds,
                self.bands()
            )));
        }
        Ok(((x - self.origin.x) as usize, (y - self.origin.y) as usize))
    }

    /// Write a row of samples of one band starting at `(x, y)`.
    ///
    /// Values are stored truncated to the layout's sample width.
    pub fn set_samples(&mut self, x: u32, y: u32, band: usize, samples: &[i32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let (col, row) = self.locate(x, y, samples.len(), band)?;
        let base = row * self.stride;
        let bands = self.layout.bands;

        match (&mut self.data, self.layout.kind) {
            (RasterData::Bytes(data), SampleKind::Packed { bits }) => {
                let bits = bits as usize;
                let mask = (1u8 << bits) - 1;
                for (i, &v) in samples.iter().enumerate() {
                    let bit = (col + i) * bits;
                    let shift = 8 - bits - (bit & 7);
                    let byte = &mut data[base + (bit >> 3)];
                    *byte = (*byte & !(mask << shift)) | (((v as u8) & mask) << shift);
                }
            }
            (RasterData::Bytes(data), _) => {
                for (i, &v) in samples.iter().enumerate() {
                    data[base + (col + i) * bands + band] = v as u8;
                }
            }
            (RasterData::Shorts(data), _) => {
                for (i, &v) in samples.iter().enumerate() {
                    data[base + (col + i) * bands + band] = v as u16;
                }
            }
            (RasterData::Ints(data), _) => {
                for (i, &v) in samples.iter().enumerate() {
                    data[base + (col + i) * bands + band] = v;
                }
            }
        }
        Ok(())
    }

    /// Write one-byte-per-pixel bilevel values into a packed 1-bit row.
    pub fn set_bilevel_row(&mut self, x: u32, y: u32, pixels: &[u8]) -> Result<()> {
        if !self.layout.is_bilevel() {
            return Err(ReaderError::Raster(format!(
                "Bilevel row written into a {:?} raster",
                self.layout.kind
            )));
        }
        if pixels.is_empty() {
            return Ok(());
        }
        let (col, row) = self.locate(x, y, pixels.len(), 0)?;
        let range = row * self.stride..(row + 1) * self.stride;

        if let RasterData::Bytes(data) = &mut self.data {
            pack_bilevel_row(pixels, &mut data[range], col);
        }
        Ok(())
    }

    /// Read back one sample.
    pub fn sample(&self, x: u32, y: u32, band: usize) -> Option<i32> {
        if band >= self.bands() || !self.bounds().contains(x, y) {
            return None;
        }
        let col = (x - self.origin.x) as usize;
        let base = (y - self.origin.y) as usize * self.stride;
        let index = base + col * self.layout.bands + band;

        let value = match (&self.data, self.layout.kind) {
            (RasterData::Bytes(data), SampleKind::Packed { bits }) => {
                let bits = bits as usize;
                let bit = col * bits;
                let shift = 8 - bits - (bit & 7);
                ((data[base + (bit >> 3)] >> shift) & ((1u8 << bits) - 1)) as i32
            }
            (RasterData::Bytes(data), _) => data[index] as i32,
            (RasterData::Shorts(data), SampleKind::Short { signed: true }) => {
                data[index] as i16 as i32
            }
            (RasterData::Shorts(data), _) => data[index] as i32,
            (RasterData::Ints(data), _) => data[index],
        };
        Some(value)
    }

    /// Storage of one packed row, for packed layouts.
    pub fn packed_row(&self, y: u32) -> Option<&[u8]> {
        if !matches!(self.layout.kind, SampleKind::Packed { .. }) {
            return None;
        }
        let bounds = self.bounds();
        if y < bounds.y || y as u64 >= bounds.bottom() {
            return None;
        }
        let row = (y - self.origin.y) as usize;
        self.as_bytes()
            .map(|data| &data[row * self.stride..(row + 1) * self.stride])
    }
}
