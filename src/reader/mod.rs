//! Tile-walking reader session.
//!
//! A [`TileReader`] owns a decode chain for the lifetime of one image and
//! serves any number of sequential reads from it. Each read resolves the
//! sample layout, the sampling grid and the tile range once, then walks
//! the tiles in row-major order pulling one scanline per band at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use j2k_tile_reader::{RegionRequest, TileReader};
//! use j2k_tile_reader::progress::NullProgress;
//!
//! let mut reader = TileReader::new(header, chain)?;
//! let request = RegionRequest::full_image().subsampling(2, 2, 0, 0);
//! let outcome = reader.decode_region(&request, None, NullProgress)?;
//! assert!(outcome.is_complete());
//! ```

mod fill;
mod line_buffer;
#[cfg(test)]
mod tests;

pub use line_buffer::LineBuffer;

use log::{debug, info, warn};
use serde::Serialize;

use self::fill::{BandPlan, ReadPlan, Walk};
use crate::chain::DecodeChain;
use crate::config::{Point, Rect, RegionRequest};
use crate::error::{ReaderError, Result};
use crate::geometry::{ImageGeometry, SamplingGrid};
use crate::header::{ChannelMap, CodestreamHeader, ComponentInfo};
use crate::normalize::SampleNormalizer;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::raster::{ColorDescription, LayoutDescriptor, Raster};

/// Terminal status of a read that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Every tile in range was delivered.
    Complete,
    /// Cancellation was observed; the raster is partially filled.
    Aborted,
}

impl ReadStatus {
    /// Whether the read ran to the end.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether the read was cancelled.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl std::fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "Complete"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Statistics of one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadSummary {
    /// How the read ended.
    pub status: ReadStatus,
    /// Destination rectangle that was (to be) written.
    pub destination: Rect,
    /// Tiles fully processed.
    pub tiles_processed: usize,
    /// Tiles in the iteration range.
    pub total_tiles: usize,
    /// Last reported progress fraction.
    pub fraction: f64,
    /// Some samples were only a progressive approximation.
    pub progressive: bool,
}

/// Result of a read: the raster plus how the read ended.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// Destination raster, partially filled when aborted.
    pub raster: Raster,
    /// Read statistics.
    pub summary: ReadSummary,
}

impl ReadOutcome {
    /// Terminal status.
    pub fn status(&self) -> ReadStatus {
        self.summary.status
    }

    /// Whether every tile in range was delivered.
    pub fn is_complete(&self) -> bool {
        self.summary.status.is_complete()
    }

    /// Whether any delivered sample was a progressive approximation.
    pub fn is_progressive(&self) -> bool {
        self.summary.progressive
    }
}

/// A raster together with its advisory color description.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Decoded samples.
    pub raster: Raster,
    /// How to interpret the bands.
    pub color: ColorDescription,
    /// Read statistics.
    pub summary: ReadSummary,
}

/// Normalization parameters of one output band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComponentDescriptor {
    /// Chain component the band is read from.
    pub component: usize,
    /// Original bit depth.
    pub bit_depth: u32,
    /// Whether the original samples are signed.
    pub signed: bool,
    /// Fixed-point fraction bits removed by normalization.
    pub fraction_bits: u32,
    /// Smallest representable value.
    pub min: i64,
    /// Largest representable value.
    pub max: i64,
    /// Constant added after the fraction shift.
    pub level_shift: i64,
}

impl ComponentDescriptor {
    /// Derive the range and level shift of a component.
    ///
    /// Unsigned 32-bit components are capped at `i32::MAX`, the largest
    /// value an int raster holds.
    pub fn new(component: usize, info: &ComponentInfo) -> Self {
        let bits = info.bit_depth.clamp(1, 32);
        let (min, max, level_shift) = if info.signed {
            (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1, 0)
        } else {
            (
                0,
                ((1i64 << bits) - 1).min(i32::MAX as i64),
                1i64 << (bits - 1),
            )
        };

        Self {
            component,
            bit_depth: info.bit_depth,
            signed: info.signed,
            fraction_bits: info.fraction_bits,
            min,
            max,
            level_shift,
        }
    }

    /// Normalizer for this band.
    pub fn normalizer(&self) -> SampleNormalizer {
        SampleNormalizer::new(self.fraction_bits, self.level_shift, self.min, self.max)
    }
}

/// Serializable description of a reader session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Image width in component samples.
    pub width: u32,
    /// Image height in component samples.
    pub height: u32,
    /// Tiles across.
    pub tiles_x: u32,
    /// Tiles down.
    pub tiles_y: u32,
    /// Nominal tile width on the reference grid.
    pub tile_width: u32,
    /// Nominal tile height on the reference grid.
    pub tile_height: u32,
    /// Component subsampling factors.
    pub subsampling: (u32, u32),
    /// One descriptor per band of a full read.
    pub components: Vec<ComponentDescriptor>,
    /// Layout of a full read.
    pub layout: LayoutDescriptor,
    /// Color description of a full read.
    pub color: ColorDescription,
    /// Whether the channel definitions remap any band.
    pub remapped_channels: bool,
}

/// Reader session over one image and its decode chain.
pub struct TileReader<C: DecodeChain> {
    header: CodestreamHeader,
    geometry: ImageGeometry,
    channel_map: ChannelMap,
    chain: C,
    lines: LineBuffer,
}

impl<C: DecodeChain> TileReader<C> {
    /// Open a session.
    ///
    /// Mixed subsampling, bit depths outside `1..=32` and malformed channel
    /// definitions are rejected here, before any tile is touched.
    pub fn new(header: CodestreamHeader, chain: C) -> Result<Self> {
        let geometry = ImageGeometry::from_header(&header)?;

        if let Some(info) = header
            .components
            .iter()
            .find(|c| c.bit_depth == 0 || c.bit_depth > 32)
        {
            return Err(ReaderError::UnsupportedBitDepth(info.bit_depth));
        }

        let channel_map = ChannelMap::new(
            header.num_components(),
            header.channel_definitions.as_deref(),
            header.has_palette,
        )?;

        let (nx, ny) = geometry.num_tiles();
        debug!(
            "Opened {}x{} image, {} components, {}x{} tiles",
            geometry.width(),
            geometry.height(),
            header.num_components(),
            nx,
            ny
        );

        Ok(Self {
            header,
            geometry,
            channel_map,
            chain,
            lines: LineBuffer::new(),
        })
    }

    /// Header the session was opened with.
    pub fn header(&self) -> &CodestreamHeader {
        &self.header
    }

    /// Image geometry.
    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    /// Resolved band-to-component map.
    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Underlying decode chain.
    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// End the session and hand the chain back.
    pub fn into_chain(self) -> C {
        self.chain
    }

    /// Descriptors of the given source bands.
    ///
    /// The sample format comes from the band's own component; samples are
    /// read from the component the channel map assigns to it.
    pub fn descriptors(&self, source_bands: &[usize]) -> Vec<ComponentDescriptor> {
        source_bands
            .iter()
            .map(|&band| {
                ComponentDescriptor::new(
                    self.channel_map.component_for(band),
                    &self.header.components[band],
                )
            })
            .collect()
    }

    /// Layout of a raster holding `num_bands` bands read from
    /// `source_bands`.
    pub fn resolve_layout(&self, source_bands: &[usize], num_bands: usize) -> Result<LayoutDescriptor> {
        let selected = source_bands.iter().filter_map(|&b| self.header.components.get(b));
        let (depth, signed) = selected.fold((0, false), |(depth, signed), c| {
            (depth.max(c.bit_depth), signed || c.signed)
        });
        let layout = LayoutDescriptor::resolve(num_bands, depth, signed)?;
        debug!(
            "Resolved {:?} layout for {} bands of up to {} bits",
            layout.kind, num_bands, depth
        );
        Ok(layout)
    }

    /// Describe the session.
    pub fn info(&self) -> Result<SessionInfo> {
        let bands: Vec<usize> = (0..self.header.num_components()).collect();
        let layout = self.resolve_layout(&bands, bands.len())?;
        let (tiles_x, tiles_y) = self.geometry.num_tiles();
        let (tile_width, tile_height) = self.geometry.nominal_tile_size();

        Ok(SessionInfo {
            width: self.geometry.width(),
            height: self.geometry.height(),
            tiles_x,
            tiles_y,
            tile_width,
            tile_height,
            subsampling: self.geometry.subsampling(),
            components: self.descriptors(&bands),
            layout,
            color: ColorDescription::for_layout(&layout),
            remapped_channels: !self.channel_map.is_identity(),
        })
    }

    /// Read the whole image at full resolution.
    pub fn decode_full_image<P: ProgressHandler>(&mut self, progress: P) -> Result<ReadOutcome> {
        self.decode_region(&RegionRequest::full_image(), None, progress)
    }

    /// Read a region into `destination`, or into a new raster covering
    /// the destination region.
    ///
    /// A supplied raster clips the destination region to its bounds and
    /// must have the resolved sample kind. Cancellation is not an error:
    /// it ends the read with [`ReadStatus::Aborted`].
    pub fn decode_region<P: ProgressHandler>(
        &mut self,
        request: &RegionRequest,
        destination: Option<Raster>,
        progress: P,
    ) -> Result<ReadOutcome> {
        match self.run_region(request, destination, &progress) {
            Ok(outcome) => {
                progress.on_complete(&outcome.summary);
                Ok(outcome)
            }
            Err(e) => {
                progress.on_error(&e);
                Err(e)
            }
        }
    }

    /// Read a region and pair it with its color description.
    pub fn read_image<P: ProgressHandler>(
        &mut self,
        request: &RegionRequest,
        progress: P,
    ) -> Result<DecodedImage> {
        let outcome = self.decode_region(request, None, progress)?;
        let color = ColorDescription::for_layout(outcome.raster.layout());
        Ok(DecodedImage {
            raster: outcome.raster,
            color,
            summary: outcome.summary,
        })
    }

    /// Read one whole tile at full resolution.
    ///
    /// The raster is positioned at the tile's image coordinates. Only band
    /// selection may be requested.
    pub fn read_tile<P: ProgressHandler>(
        &mut self,
        tile_x: u32,
        tile_y: u32,
        request: &RegionRequest,
        progress: P,
    ) -> Result<ReadOutcome> {
        if !request.is_untransformed() || request.source_region.is_some() {
            return Err(ReaderError::InvalidRequest(
                "Tile reads do not support regions, subsampling or destination offsets".into(),
            ));
        }

        let (nx, ny) = self.geometry.num_tiles();
        if tile_x >= nx || tile_y >= ny {
            return Err(ReaderError::InvalidRequest(format!(
                "Tile ({}, {}) outside the {}x{} tile grid",
                tile_x, tile_y, nx, ny
            )));
        }

        let tile = self.geometry.tile_rect(tile_x, tile_y);
        let mut tile_request = request.clone().source_region(tile);
        tile_request.destination_offset = Point::new(tile.x, tile.y);

        self.decode_region(&tile_request, None, progress)
    }

    fn run_region<P: ProgressHandler>(
        &mut self,
        request: &RegionRequest,
        destination: Option<Raster>,
        progress: &P,
    ) -> Result<ReadOutcome> {
        let (mut raster, plan) = match self.prepare(request, destination)? {
            (raster, Some(plan)) => (raster, plan),
            (raster, None) => {
                let summary = ReadSummary {
                    status: ReadStatus::Complete,
                    destination: Rect::default(),
                    tiles_processed: 0,
                    total_tiles: 0,
                    fraction: 1.0,
                    progressive: false,
                };
                return Ok(ReadOutcome { raster, summary });
            }
        };

        let (grid, clip, range) = (plan.grid, plan.clip, plan.range);
        info!(
            "Reading {} at scale {}x{} from ({}, {}), tiles ({}, {})..=({}, {})",
            clip,
            grid.scale_x,
            grid.scale_y,
            grid.source_origin.x,
            grid.source_origin.y,
            range.start_x,
            range.start_y,
            range.end_x,
            range.end_y
        );
        progress.on_progress(&ProgressEvent::started(range.count(), clip));

        let direct = grid.is_identity(&self.geometry) && clip == grid.destination;
        let walk = if direct {
            fill::fill_direct(
                &self.geometry,
                &mut self.chain,
                &mut self.lines,
                &plan,
                &mut raster,
                progress,
            )?
        } else {
            fill::fill_subsampled(
                &self.geometry,
                &mut self.chain,
                &mut self.lines,
                &plan,
                &mut raster,
                progress,
            )?
        };

        Ok(ReadOutcome {
            raster,
            summary: summarize(walk, &plan),
        })
    }

    /// Validate a request and resolve its raster and plan.
    ///
    /// No plan is returned when the destination region misses the raster.
    fn prepare(
        &self,
        request: &RegionRequest,
        destination: Option<Raster>,
    ) -> Result<(Raster, Option<ReadPlan>)> {
        let num_components = self.header.num_components();
        request.validate(num_components)?;

        let grid = SamplingGrid::new(&self.geometry, request)?;
        let source_bands = request.resolved_source_bands(num_components);
        let dest_bands = request.resolved_destination_bands(source_bands.len());

        let (raster, clip) = match destination {
            Some(raster) => {
                let layout = self.resolve_layout(&source_bands, raster.bands())?;
                if layout.kind != raster.layout().kind {
                    return Err(ReaderError::Raster(format!(
                        "Destination holds {:?} samples, image needs {:?}",
                        raster.layout().kind,
                        layout.kind
                    )));
                }
                let clip = raster.bounds().intersection(&grid.destination);
                (raster, clip)
            }
            None => {
                let layout = self.resolve_layout(&source_bands, source_bands.len())?;
                let target = grid.destination;
                let raster = Raster::new(layout, target.width, target.height)?
                    .with_origin(Point::new(target.x, target.y));
                (raster, target)
            }
        };

        if let Some(&band) = dest_bands.iter().find(|&&b| b >= raster.bands()) {
            return Err(ReaderError::InvalidRequest(format!(
                "Destination band {} out of range (raster has {} bands)",
                band,
                raster.bands()
            )));
        }

        if clip.is_empty() {
            info!(
                "Destination {} does not meet raster {}; nothing to read",
                grid.destination,
                raster.bounds()
            );
            return Ok((raster, None));
        }

        let bilevel = raster.layout().is_bilevel();
        let bands = self
            .descriptors(&source_bands)
            .into_iter()
            .zip(&dest_bands)
            .map(|(descriptor, &dest_band)| {
                let normalizer = descriptor.normalizer();
                BandPlan {
                    component: descriptor.component,
                    dest_band,
                    normalizer: if bilevel { normalizer.bilevel() } else { normalizer },
                }
            })
            .collect();

        let plan = ReadPlan {
            grid,
            clip,
            range: grid.tile_range(&self.geometry, &clip),
            bands,
            bilevel,
        };
        Ok((raster, Some(plan)))
    }
}

fn summarize(walk: Walk, plan: &ReadPlan) -> ReadSummary {
    let total_tiles = plan.range.count();
    if walk.status.is_aborted() {
        warn!(
            "Read aborted after {} of {} tiles",
            walk.tiles_processed, total_tiles
        );
    }
    if walk.progressive {
        warn!("Read delivered progressive samples");
    }

    ReadSummary {
        status: walk.status,
        destination: plan.clip,
        tiles_processed: walk.tiles_processed,
        total_tiles,
        fraction: walk.fraction,
        progressive: walk.progressive,
    }
}
