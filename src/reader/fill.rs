//! Tile walks that move chain rows into a raster.

use log::{debug, trace};

use super::line_buffer::LineBuffer;
use super::ReadStatus;
use crate::chain::{DecodeChain, TileWindow};
use crate::config::Rect;
use crate::error::Result;
use crate::geometry::{ImageGeometry, SamplingGrid, TileCursor, TileRange};
use crate::normalize::SampleNormalizer;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::raster::Raster;

/// One selected band of a read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BandPlan {
    pub component: usize,
    pub dest_band: usize,
    pub normalizer: SampleNormalizer,
}

/// Everything a walk needs, resolved once per call.
#[derive(Debug, Clone)]
pub(crate) struct ReadPlan {
    pub grid: SamplingGrid,
    pub clip: Rect,
    pub range: TileRange,
    pub bands: Vec<BandPlan>,
    pub bilevel: bool,
}

/// Where a walk stopped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Walk {
    pub status: ReadStatus,
    pub tiles_processed: usize,
    pub progressive: bool,
    pub fraction: f64,
}

impl Walk {
    fn new() -> Self {
        Self {
            status: ReadStatus::Complete,
            tiles_processed: 0,
            progressive: false,
            fraction: 0.0,
        }
    }

    fn abort(mut self) -> Self {
        self.status = ReadStatus::Aborted;
        self
    }
}

/// Source window of one scanline and where its samples land.
///
/// Column `k` of `dest` reads `raw[first + k * step]` of the window.
#[derive(Debug, Clone, Copy)]
struct RowSpan {
    window: TileWindow,
    first: usize,
    step: usize,
    dest: Rect,
}

/// Position of the active tile within the walk.
#[derive(Debug, Clone, Copy)]
struct TileStep {
    tile: (u32, u32),
    index: usize,
    total: usize,
}

/// Fetch, normalize and store one row of every band.
fn deliver_row<C: DecodeChain + ?Sized>(
    chain: &mut C,
    lines: &mut LineBuffer,
    plan: &ReadPlan,
    raster: &mut Raster,
    span: RowSpan,
) -> Result<bool> {
    let RowSpan {
        window,
        first,
        step,
        dest,
    } = span;
    let width = window.width as usize;
    let count = dest.width as usize;
    let mut progressive = false;

    for band in &plan.bands {
        let fidelity = if plan.bilevel {
            let (raw, bytes) = lines.bilevel_rows(width, count);
            let fidelity = chain.request_samples(band.component, window, raw)?;
            band.normalizer.normalize_bytes_strided(raw, first, step, bytes);
            raster.set_bilevel_row(dest.x, dest.y, bytes)?;
            fidelity
        } else {
            let (raw, out) = lines.rows(width, count);
            let fidelity = chain.request_samples(band.component, window, raw)?;
            if first == 0 && step == 1 {
                band.normalizer.normalize(raw, out);
            } else {
                band.normalizer.normalize_strided(raw, first, step, out);
            }
            raster.set_samples(dest.x, dest.y, band.dest_band, out)?;
            fidelity
        };
        progressive |= fidelity.is_progressive();
    }

    Ok(progressive)
}

fn report_row<P: ProgressHandler + ?Sized>(
    progress: &P,
    walk: &mut Walk,
    step: TileStep,
    rows_done: u32,
    rows: u32,
    updated: Rect,
) {
    walk.fraction =
        (step.index as f64 + rows_done as f64 / rows as f64) / step.total as f64;
    progress.on_progress(&ProgressEvent::decoding(
        step.tile,
        walk.tiles_processed,
        step.total,
        walk.fraction,
        updated,
    ));
}

/// General walk: any region, subsampling and destination clip.
pub(crate) fn fill_subsampled<C, P>(
    geometry: &ImageGeometry,
    chain: &mut C,
    lines: &mut LineBuffer,
    plan: &ReadPlan,
    raster: &mut Raster,
    progress: &P,
) -> Result<Walk>
where
    C: DecodeChain + ?Sized,
    P: ProgressHandler + ?Sized,
{
    let total = plan.range.count();
    let mut walk = Walk::new();

    for (index, (tx, ty)) in plan.range.iter().enumerate() {
        if progress.is_cancelled() {
            return Ok(walk.abort());
        }

        debug!("Activating tile ({}, {})", tx, ty);
        chain.activate_tile(tx, ty)?;
        let step = TileStep {
            tile: (tx, ty),
            index,
            total,
        };

        let cursor = TileCursor::compute(geometry, &plan.grid, &plan.clip, tx, ty);
        if !cursor.is_empty() {
            for j in 0..cursor.dest_height {
                if progress.is_cancelled() {
                    return Ok(walk.abort());
                }

                let window = TileWindow::row(cursor.intra_x, cursor.tile_row(j), cursor.width);
                let dest = Rect::new(cursor.dest_x, cursor.dest_y + j, cursor.dest_width, 1);
                trace!(
                    "Tile ({}, {}) row {} -> destination row {}",
                    tx,
                    ty,
                    window.y,
                    dest.y
                );

                let span = RowSpan {
                    window,
                    first: cursor.row_index(0),
                    step: cursor.step_x as usize,
                    dest,
                };
                walk.progressive |= deliver_row(chain, lines, plan, raster, span)?;
                report_row(progress, &mut walk, step, j + 1, cursor.dest_height, dest);
            }
        }

        walk.tiles_processed += 1;
    }

    walk.fraction = 1.0;
    Ok(walk)
}

/// Identity walk: full image, unit scale, destination equal to the image.
///
/// Each tile is copied row by row to its own position without any
/// sampling-grid arithmetic.
pub(crate) fn fill_direct<C, P>(
    geometry: &ImageGeometry,
    chain: &mut C,
    lines: &mut LineBuffer,
    plan: &ReadPlan,
    raster: &mut Raster,
    progress: &P,
) -> Result<Walk>
where
    C: DecodeChain + ?Sized,
    P: ProgressHandler + ?Sized,
{
    let total = plan.range.count();
    let mut walk = Walk::new();

    for (index, (tx, ty)) in plan.range.iter().enumerate() {
        if progress.is_cancelled() {
            return Ok(walk.abort());
        }

        debug!("Activating tile ({}, {})", tx, ty);
        chain.activate_tile(tx, ty)?;
        let step = TileStep {
            tile: (tx, ty),
            index,
            total,
        };

        let tile = geometry.tile_rect(tx, ty);
        if !tile.is_empty() {
            for row in 0..tile.height {
                if progress.is_cancelled() {
                    return Ok(walk.abort());
                }

                let window = TileWindow::row(0, row, tile.width);
                let dest = Rect::new(tile.x, tile.y + row, tile.width, 1);
                trace!("Tile ({}, {}) row {}", tx, ty, row);

                let span = RowSpan {
                    window,
                    first: 0,
                    step: 1,
                    dest,
                };
                walk.progressive |= deliver_row(chain, lines, plan, raster, span)?;
                report_row(progress, &mut walk, step, row + 1, tile.height, dest);
            }
        }

        walk.tiles_processed += 1;
    }

    walk.fraction = 1.0;
    Ok(walk)
}
