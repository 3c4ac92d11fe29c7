//! Read parameters: regions, subsampling, band selection.

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// A position in destination or image space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: u32,
    /// Vertical coordinate.
    pub y: u32,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with unsigned origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    pub const fn with_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether the rectangle covers no samples.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Intersection of two rectangles; empty rectangles keep the
    /// clamped origin so callers can still inspect where they fell.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect {
            x,
            y,
            width: right.saturating_sub(x as u64) as u32,
            height: bottom.saturating_sub(y as u64) as u32,
        }
    }

    /// Smallest rectangle covering both; an empty side is ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: (self.right().max(other.right()) - x as u64) as u32,
            height: (self.bottom().max(other.bottom()) - y as u64) as u32,
        }
    }

    /// Whether the point lies inside the rectangle.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && (x as u64) < self.right() && y >= self.y && (y as u64) < self.bottom()
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Parameters of one read call.
///
/// Source coordinates are unsubsampled image coordinates (relative to the
/// image's upper-left sample). Destination samples are derived from the
/// source rectangle and the scale factors, never the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionRequest {
    /// Source rectangle; `None` reads the full image.
    pub source_region: Option<Rect>,
    /// Horizontal subsampling factor (>= 1).
    pub scale_x: u32,
    /// Vertical subsampling factor (>= 1).
    pub scale_y: u32,
    /// Horizontal subsampling phase, in `[0, scale_x)`.
    pub x_offset: u32,
    /// Vertical subsampling phase, in `[0, scale_y)`.
    pub y_offset: u32,
    /// Where the first delivered sample lands in the destination.
    pub destination_offset: Point,
    /// Codestream bands to read; `None` reads every component in order.
    pub source_bands: Option<Vec<usize>>,
    /// Destination band for each source band; `None` is the identity.
    pub destination_bands: Option<Vec<usize>>,
}

impl Default for RegionRequest {
    fn default() -> Self {
        Self {
            source_region: None,
            scale_x: 1,
            scale_y: 1,
            x_offset: 0,
            y_offset: 0,
            destination_offset: Point::default(),
            source_bands: None,
            destination_bands: None,
        }
    }
}

impl RegionRequest {
    /// Read the whole image at full resolution.
    pub fn full_image() -> Self {
        Self::default()
    }

    /// Restrict the read to a source rectangle.
    pub fn source_region(mut self, region: Rect) -> Self {
        self.source_region = Some(region);
        self
    }

    /// Set subsampling factors and phase offsets.
    pub fn subsampling(mut self, scale_x: u32, scale_y: u32, x_offset: u32, y_offset: u32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self.x_offset = x_offset;
        self.y_offset = y_offset;
        self
    }

    /// Set the destination offset.
    pub fn destination_offset(mut self, offset: Point) -> Self {
        self.destination_offset = offset;
        self
    }

    /// Select the codestream bands to read.
    pub fn source_bands(mut self, bands: Vec<usize>) -> Self {
        self.source_bands = Some(bands);
        self
    }

    /// Select the destination band of each source band.
    pub fn destination_bands(mut self, bands: Vec<usize>) -> Self {
        self.destination_bands = Some(bands);
        self
    }

    /// True when nothing but the identity transform is requested.
    pub fn is_untransformed(&self) -> bool {
        self.scale_x == 1
            && self.scale_y == 1
            && self.x_offset == 0
            && self.y_offset == 0
            && self.destination_offset == Point::default()
    }

    /// Source bands with the default applied.
    pub fn resolved_source_bands(&self, num_components: usize) -> Vec<usize> {
        match &self.source_bands {
            Some(bands) => bands.clone(),
            None => (0..num_components).collect(),
        }
    }

    /// Destination bands with the default applied.
    pub fn resolved_destination_bands(&self, num_bands: usize) -> Vec<usize> {
        match &self.destination_bands {
            Some(bands) => bands.clone(),
            None => (0..num_bands).collect(),
        }
    }

    /// Validate the request against the component count of the image.
    pub fn validate(&self, num_components: usize) -> Result<()> {
        if self.scale_x == 0 || self.scale_y == 0 {
            return Err(ReaderError::InvalidRequest(format!(
                "Subsampling factors must be >= 1 (got {}x{})",
                self.scale_x, self.scale_y
            )));
        }

        if self.x_offset >= self.scale_x || self.y_offset >= self.scale_y {
            return Err(ReaderError::InvalidRequest(format!(
                "Subsampling offsets ({}, {}) must be smaller than the factors ({}, {})",
                self.x_offset, self.y_offset, self.scale_x, self.scale_y
            )));
        }

        if let Some(region) = &self.source_region {
            if region.is_empty() {
                return Err(ReaderError::InvalidRequest(format!(
                    "Source region {} is empty",
                    region
                )));
            }
        }

        let source = self.resolved_source_bands(num_components);
        if source.is_empty() {
            return Err(ReaderError::InvalidRequest("No source bands selected".into()));
        }
        if let Some(&bad) = source.iter().find(|&&b| b >= num_components) {
            return Err(ReaderError::InvalidRequest(format!(
                "Source band {} out of range (image has {} components)",
                bad, num_components
            )));
        }

        let destination = self.resolved_destination_bands(source.len());
        if destination.len() != source.len() {
            return Err(ReaderError::InvalidRequest(format!(
                "Destination band count {} does not match source band count {}",
                destination.len(),
                source.len()
            )));
        }

        let mut seen = destination.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != destination.len() {
            return Err(ReaderError::InvalidRequest(
                "Destination bands must be distinct".into(),
            ));
        }

        Ok(())
    }
}
