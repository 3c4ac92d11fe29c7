//! Image and tile geometry in component sample coordinates.
//!
//! Header values live on the reference grid. The decode chain delivers
//! samples at component resolution, so every extent here is converted with
//! `ceil(coord / subsampling)`; with unit subsampling the two spaces agree.

mod cursor;

pub use cursor::{SamplingGrid, TileCursor, TileRange};

use crate::config::Rect;
use crate::error::{ReaderError, Result};
use crate::header::CodestreamHeader;

#[inline]
pub(crate) fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Half-open range of sample positions along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First position.
    pub start: u32,
    /// One past the last position.
    pub end: u32,
}

impl Span {
    /// Number of positions.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tiling of one image, immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGeometry {
    image_x0: u64,
    image_y0: u64,
    image_x1: u64,
    image_y1: u64,
    tile_x0: u64,
    tile_y0: u64,
    tile_width: u64,
    tile_height: u64,
    subsampling_x: u64,
    subsampling_y: u64,
    comp_x0: u64,
    comp_y0: u64,
    width: u32,
    height: u32,
    num_tiles_x: u32,
    num_tiles_y: u32,
}

impl ImageGeometry {
    /// Derive the geometry from header values.
    ///
    /// Mixed component subsampling, empty images and tile grids that do
    /// not cover the image origin are configuration errors.
    pub fn from_header(header: &CodestreamHeader) -> Result<Self> {
        let first = header
            .components
            .first()
            .ok_or_else(|| ReaderError::Config("Image declares no components".into()))?;

        let (sx, sy) = (first.subsampling_x, first.subsampling_y);
        if sx == 0 || sy == 0 {
            return Err(ReaderError::Config(format!(
                "Invalid component subsampling {}x{}",
                sx, sy
            )));
        }
        if let Some((idx, c)) = header
            .components
            .iter()
            .enumerate()
            .find(|(_, c)| c.subsampling_x != sx || c.subsampling_y != sy)
        {
            return Err(ReaderError::Config(format!(
                "Component {} uses subsampling {}x{}, component 0 uses {}x{}; \
                 mixed subsampling is not supported",
                idx, c.subsampling_x, c.subsampling_y, sx, sy
            )));
        }

        if header.width == 0 || header.height == 0 {
            return Err(ReaderError::Config(format!(
                "Invalid image dimensions {}x{}",
                header.width, header.height
            )));
        }
        if header.tile_width == 0 || header.tile_height == 0 {
            return Err(ReaderError::Config(format!(
                "Invalid tile dimensions {}x{}",
                header.tile_width, header.tile_height
            )));
        }

        let (x0, y0) = (header.image_x0 as u64, header.image_y0 as u64);
        let (tx0, ty0) = (header.tile_x0 as u64, header.tile_y0 as u64);
        let (tw, th) = (header.tile_width as u64, header.tile_height as u64);

        if tx0 > x0 || x0 >= tx0 + tw || ty0 > y0 || y0 >= ty0 + th {
            return Err(ReaderError::Config(format!(
                "Tile grid origin ({}, {}) does not cover image origin ({}, {})",
                tx0, ty0, x0, y0
            )));
        }

        let x1 = x0 + header.width as u64;
        let y1 = y0 + header.height as u64;
        let (sx, sy) = (sx as u64, sy as u64);

        let comp_x0 = ceil_div(x0, sx);
        let comp_y0 = ceil_div(y0, sy);
        let width = ceil_div(x1, sx) - comp_x0;
        let height = ceil_div(y1, sy) - comp_y0;
        if width == 0 || height == 0 {
            return Err(ReaderError::Config(
                "Image is empty at component resolution".into(),
            ));
        }

        let num_tiles_x = ceil_div(x1 - tx0, tw);
        let num_tiles_y = ceil_div(y1 - ty0, th);

        Ok(Self {
            image_x0: x0,
            image_y0: y0,
            image_x1: x1,
            image_y1: y1,
            tile_x0: tx0,
            tile_y0: ty0,
            tile_width: tw,
            tile_height: th,
            subsampling_x: sx,
            subsampling_y: sy,
            comp_x0,
            comp_y0,
            width: width as u32,
            height: height as u32,
            num_tiles_x: num_tiles_x as u32,
            num_tiles_y: num_tiles_y as u32,
        })
    }

    /// Image width in component samples.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in component samples.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image bounds in component samples.
    pub fn bounds(&self) -> Rect {
        Rect::with_size(self.width, self.height)
    }

    /// Number of tiles across and down.
    pub fn num_tiles(&self) -> (u32, u32) {
        (self.num_tiles_x, self.num_tiles_y)
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.num_tiles_x as usize * self.num_tiles_y as usize
    }

    /// Nominal tile size on the reference grid.
    pub fn nominal_tile_size(&self) -> (u32, u32) {
        (self.tile_width as u32, self.tile_height as u32)
    }

    /// Component subsampling factors.
    pub fn subsampling(&self) -> (u32, u32) {
        (self.subsampling_x as u32, self.subsampling_y as u32)
    }

    /// Columns covered by tile column `tx`, in image coordinates.
    pub fn tile_span_x(&self, tx: u32) -> Span {
        Self::span(
            self.tile_x0 + tx as u64 * self.tile_width,
            self.tile_width,
            self.image_x0,
            self.image_x1,
            self.subsampling_x,
            self.comp_x0,
        )
    }

    /// Rows covered by tile row `ty`, in image coordinates.
    pub fn tile_span_y(&self, ty: u32) -> Span {
        Self::span(
            self.tile_y0 + ty as u64 * self.tile_height,
            self.tile_height,
            self.image_y0,
            self.image_y1,
            self.subsampling_y,
            self.comp_y0,
        )
    }

    /// Footprint of a tile in image coordinates.
    pub fn tile_rect(&self, tx: u32, ty: u32) -> Rect {
        let xs = self.tile_span_x(tx);
        let ys = self.tile_span_y(ty);
        Rect::new(xs.start, ys.start, xs.len(), ys.len())
    }

    /// Tile column holding image column `x`, clipped to the grid.
    pub fn tile_column(&self, x: u32) -> u32 {
        let reference = (x as u64 + self.comp_x0) * self.subsampling_x;
        let index = reference.saturating_sub(self.tile_x0) / self.tile_width;
        index.min(self.num_tiles_x as u64 - 1) as u32
    }

    /// Tile row holding image row `y`, clipped to the grid.
    pub fn tile_row(&self, y: u32) -> u32 {
        let reference = (y as u64 + self.comp_y0) * self.subsampling_y;
        let index = reference.saturating_sub(self.tile_y0) / self.tile_height;
        index.min(self.num_tiles_y as u64 - 1) as u32
    }

    fn span(tile_start: u64, tile_size: u64, lo: u64, hi: u64, sub: u64, comp0: u64) -> Span {
        let a = tile_start.max(lo);
        let b = (tile_start + tile_size).min(hi).max(a);
        Span {
            start: (ceil_div(a, sub) - comp0) as u32,
            end: (ceil_div(b, sub) - comp0) as u32,
        }
    }
}
