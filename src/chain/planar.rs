//! In-memory decode chain over fully reconstructed component planes.

use super::{DecodeChain, Fidelity, TileWindow};
use crate::config::Rect;
use crate::error::{ReaderError, Result};
use crate::geometry::ImageGeometry;
use crate::header::CodestreamHeader;

/// Decode chain serving samples from one plane per component.
///
/// Planes hold raw chain values (fraction bits included, no level shift)
/// at component resolution, row-major.
#[derive(Debug, Clone)]
pub struct PlanarChain {
    geometry: ImageGeometry,
    planes: Vec<Vec<i32>>,
    active: Option<Rect>,
    fidelity: Fidelity,
}

impl PlanarChain {
    /// Wrap component planes laid out according to `header`.
    pub fn new(header: &CodestreamHeader, planes: Vec<Vec<i32>>) -> Result<Self> {
        let geometry = ImageGeometry::from_header(header)?;

        if planes.len() != header.num_components() {
            return Err(ReaderError::Config(format!(
                "Expected {} component planes, got {}",
                header.num_components(),
                planes.len()
            )));
        }

        let expected = geometry.width() as usize * geometry.height() as usize;
        if let Some((idx, plane)) = planes.iter().enumerate().find(|(_, p)| p.len() != expected) {
            return Err(ReaderError::Config(format!(
                "Plane {} holds {} samples, expected {}",
                idx,
                plane.len(),
                expected
            )));
        }

        Ok(Self {
            geometry,
            planes,
            active: None,
            fidelity: Fidelity::Final,
        })
    }

    /// Build planes by evaluating `sample(component, x, y)` over the image.
    pub fn from_fn<F>(header: &CodestreamHeader, sample: F) -> Result<Self>
    where
        F: Fn(usize, u32, u32) -> i32,
    {
        let geometry = ImageGeometry::from_header(header)?;
        let (width, height) = (geometry.width(), geometry.height());

        let planes = (0..header.num_components())
            .map(|c| {
                (0..height)
                    .flat_map(|y| (0..width).map(move |x| (x, y)))
                    .map(|(x, y)| sample(c, x, y))
                    .collect()
            })
            .collect();

        Self::new(header, planes)
    }

    /// Report every request with the given fidelity.
    pub fn with_fidelity(mut self, fidelity: Fidelity) -> Self {
        self.fidelity = fidelity;
        self
    }

    /// Geometry the planes were validated against.
    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    /// Raw component planes.
    pub fn planes(&self) -> &[Vec<i32>] {
        &self.planes
    }
}

impl DecodeChain for PlanarChain {
    fn activate_tile(&mut self, tile_x: u32, tile_y: u32) -> Result<()> {
        let (nx, ny) = self.geometry.num_tiles();
        if tile_x >= nx || tile_y >= ny {
            return Err(ReaderError::Chain(format!(
                "Tile ({}, {}) outside the {}x{} tile grid",
                tile_x, tile_y, nx, ny
            )));
        }
        self.active = Some(self.geometry.tile_rect(tile_x, tile_y));
        Ok(())
    }

    fn request_samples(
        &mut self,
        component: usize,
        window: TileWindow,
        out: &mut [i32],
    ) -> Result<Fidelity> {
        let tile = self
            .active
            .ok_or_else(|| ReaderError::Chain("No active tile".into()))?;
        let plane = self.planes.get(component).ok_or_else(|| {
            ReaderError::Chain(format!("Component {} does not exist", component))
        })?;

        if window.x as u64 + window.width as u64 > tile.width as u64
            || window.y as u64 + window.height as u64 > tile.height as u64
        {
            return Err(ReaderError::Chain(format!(
                "Window {}x{}+{}+{} exceeds the {}x{} tile",
                window.width, window.height, window.x, window.y, tile.width, tile.height
            )));
        }
        if out.len() != window.len() {
            return Err(ReaderError::Chain(format!(
                "Output buffer holds {} samples, window needs {}",
                out.len(),
                window.len()
            )));
        }

        let stride = self.geometry.width() as usize;
        let width = window.width as usize;
        for (row, chunk) in out.chunks_mut(width.max(1)).enumerate() {
            let y = (tile.y + window.y) as usize + row;
            let x = (tile.x + window.x) as usize;
            let start = y * stride + x;
            chunk.copy_from_slice(&plane[start..start + width]);
        }

        Ok(self.fidelity)
    }
}
