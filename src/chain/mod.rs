//! Decode chain interface.
//!
//! The entropy decoder, dequantizer, inverse wavelet and inverse component
//! transforms sit behind [`DecodeChain`]. The reader only activates tiles
//! and pulls rows of reconstructed integer samples out of the active tile.

mod planar;

pub use planar::PlanarChain;

use crate::error::Result;

/// Quality of the samples returned by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fidelity {
    /// Fully decoded samples.
    #[default]
    Final,
    /// An approximation from a partial decode pass.
    Progressive,
}

impl Fidelity {
    /// Whether the samples are a progressive approximation.
    pub fn is_progressive(&self) -> bool {
        matches!(self, Self::Progressive)
    }
}

/// Rectangle of samples inside the active tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    /// Intra-tile column of the first sample.
    pub x: u32,
    /// Intra-tile row of the first sample.
    pub y: u32,
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
}

impl TileWindow {
    /// A single row of `width` samples.
    pub fn row(x: u32, y: u32, width: u32) -> Self {
        Self {
            x,
            y,
            width,
            height: 1,
        }
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of reconstructed samples, one tile at a time.
///
/// Implementations keep tile-scoped mutable state, so a chain is driven by
/// a single reader session and never concurrently.
pub trait DecodeChain {
    /// Prepare the chain to serve samples of tile `(tile_x, tile_y)`.
    fn activate_tile(&mut self, tile_x: u32, tile_y: u32) -> Result<()>;

    /// Fill `out` with the samples of `window` for `component`, row-major.
    ///
    /// `out.len()` equals `window.len()`. Samples are post inverse-wavelet
    /// and post inverse component transform, still carrying fraction bits
    /// and without level shift.
    fn request_samples(
        &mut self,
        component: usize,
        window: TileWindow,
        out: &mut [i32],
    ) -> Result<Fidelity>;
}

impl<C: DecodeChain + ?Sized> DecodeChain for Box<C> {
    fn activate_tile(&mut self, tile_x: u32, tile_y: u32) -> Result<()> {
        (**self).activate_tile(tile_x, tile_y)
    }

    fn request_samples(
        &mut self,
        component: usize,
        window: TileWindow,
        out: &mut [i32],
    ) -> Result<Fidelity> {
        (**self).request_samples(component, window, out)
    }
}
