//! Per-call sampling grid and per-tile intersection math.

use super::{ceil_div, ImageGeometry, Span};
use crate::config::{Point, Rect, RegionRequest};
use crate::error::{ReaderError, Result};

/// Mapping between source samples and destination samples for one call.
///
/// Destination sample `d` (relative to `destination.x`) reads source
/// column `source_origin.x + d * scale_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingGrid {
    /// First source sample, after clipping and subsampling phase.
    pub source_origin: Point,
    /// Horizontal subsampling factor.
    pub scale_x: u32,
    /// Vertical subsampling factor.
    pub scale_y: u32,
    /// Destination region: offset plus derived size.
    pub destination: Rect,
}

impl SamplingGrid {
    /// Resolve a request against the image bounds.
    ///
    /// The destination size is `ceil(source / scale)` of the clipped,
    /// phase-shifted source rectangle.
    pub fn new(geometry: &ImageGeometry, request: &RegionRequest) -> Result<Self> {
        if request.scale_x == 0 || request.scale_y == 0 {
            return Err(ReaderError::InvalidRequest(
                "Subsampling factors must be >= 1".into(),
            ));
        }

        let image = geometry.bounds();
        let mut source = request.source_region.unwrap_or(image).intersection(&image);
        if !source.is_empty() {
            source.x += request.x_offset;
            source.y += request.y_offset;
            source.width = source.width.saturating_sub(request.x_offset);
            source.height = source.height.saturating_sub(request.y_offset);
        }

        if source.is_empty() {
            return Err(ReaderError::InvalidRequest(format!(
                "Source region is empty after clipping to the {}x{} image",
                image.width, image.height
            )));
        }

        let width = ceil_div(source.width as u64, request.scale_x as u64) as u32;
        let height = ceil_div(source.height as u64, request.scale_y as u64) as u32;

        let offset = request.destination_offset;
        if offset.x.checked_add(width).is_none() || offset.y.checked_add(height).is_none() {
            return Err(ReaderError::InvalidRequest(format!(
                "Destination {}x{} at ({}, {}) exceeds the coordinate range",
                width, height, offset.x, offset.y
            )));
        }

        Ok(Self {
            source_origin: Point::new(source.x, source.y),
            scale_x: request.scale_x,
            scale_y: request.scale_y,
            destination: Rect::new(
                request.destination_offset.x,
                request.destination_offset.y,
                width,
                height,
            ),
        })
    }

    /// True when source and destination coincide with the full image.
    pub fn is_identity(&self, geometry: &ImageGeometry) -> bool {
        self.scale_x == 1
            && self.scale_y == 1
            && self.source_origin == Point::default()
            && self.destination == geometry.bounds()
    }

    /// First and last (inclusive) source samples for a clipped
    /// destination rectangle.
    pub fn source_extent(&self, clip: &Rect) -> (Point, Point) {
        let start = Point::new(
            (clip.x - self.destination.x) * self.scale_x + self.source_origin.x,
            (clip.y - self.destination.y) * self.scale_y + self.source_origin.y,
        );
        let end = Point::new(
            start.x + (clip.width - 1) * self.scale_x,
            start.y + (clip.height - 1) * self.scale_y,
        );
        (start, end)
    }

    /// Tiles touched by the source extent of a clipped destination.
    pub fn tile_range(&self, geometry: &ImageGeometry, clip: &Rect) -> TileRange {
        let (start, end) = self.source_extent(clip);
        TileRange {
            start_x: geometry.tile_column(start.x),
            start_y: geometry.tile_row(start.y),
            end_x: geometry.tile_column(end.x),
            end_y: geometry.tile_row(end.y),
        }
    }
}

/// Inclusive rectangle of tile indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    /// First tile column.
    pub start_x: u32,
    /// First tile row.
    pub start_y: u32,
    /// Last tile column.
    pub end_x: u32,
    /// Last tile row.
    pub end_y: u32,
}

impl TileRange {
    /// Range covering every tile of the image.
    pub fn all(geometry: &ImageGeometry) -> Self {
        let (nx, ny) = geometry.num_tiles();
        Self {
            start_x: 0,
            start_y: 0,
            end_x: nx - 1,
            end_y: ny - 1,
        }
    }

    /// Tiles per row of the range.
    pub fn columns(&self) -> u32 {
        self.end_x - self.start_x + 1
    }

    /// Number of tiles in the range.
    pub fn count(&self) -> usize {
        self.columns() as usize * (self.end_y - self.start_y + 1) as usize
    }

    /// Tile indices in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start_y..=self.end_y)
            .flat_map(move |ty| (self.start_x..=self.end_x).map(move |tx| (tx, ty)))
    }
}

/// Placement of one tile's samples in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCursor {
    /// Tile column.
    pub tile_x: u32,
    /// Tile row.
    pub tile_y: u32,
    /// Offset of the clipped footprint inside the tile.
    pub intra_x: u32,
    /// Offset of the clipped footprint inside the tile.
    pub intra_y: u32,
    /// Clipped footprint width in source samples.
    pub width: u32,
    /// Clipped footprint height in source samples.
    pub height: u32,
    /// First destination column written by this tile.
    pub dest_x: u32,
    /// First destination row written by this tile.
    pub dest_y: u32,
    /// Destination columns written by this tile.
    pub dest_width: u32,
    /// Destination rows written by this tile.
    pub dest_height: u32,
    /// Offset, inside the footprint, of the first sampled column.
    pub first_column: u32,
    /// Offset, inside the footprint, of the first sampled row.
    pub first_row: u32,
    /// Horizontal stride between sampled columns.
    pub step_x: u32,
    /// Vertical stride between sampled rows.
    pub step_y: u32,
}

struct AxisCut {
    intra: u32,
    len: u32,
    dest_start: u32,
    dest_len: u32,
    first: u32,
}

/// Clip a tile span against `[src_start, src_end]` and place it on the
/// destination axis. Fractional positions round up to the next
/// destination sample.
fn cut_axis(
    span: Span,
    src_start: u32,
    src_end: u32,
    origin: u32,
    scale: u32,
    dest_offset: u32,
) -> AxisCut {
    let mut start = span.start;
    let mut len = span.len();
    let mut intra = 0;

    if src_start > start {
        intra = src_start - start;
        len = len.saturating_sub(intra);
        start = src_start;
    }
    if len > 0 && (src_end as u64) < start as u64 + len as u64 - 1 {
        len = (src_end as u64 + 1).saturating_sub(start as u64) as u32;
    }

    let scale = scale as u64;
    let from_origin = (start - origin) as u64;
    let d0 = ceil_div(from_origin, scale);
    let d1 = ceil_div(from_origin + len as u64, scale);

    AxisCut {
        intra,
        len,
        dest_start: d0 as u32 + dest_offset,
        dest_len: (d1 - d0) as u32,
        first: (d0 * scale - from_origin) as u32,
    }
}

impl TileCursor {
    /// Intersect tile `(tile_x, tile_y)` with the source extent of `clip`.
    pub fn compute(
        geometry: &ImageGeometry,
        grid: &SamplingGrid,
        clip: &Rect,
        tile_x: u32,
        tile_y: u32,
    ) -> Self {
        let (start, end) = grid.source_extent(clip);
        let xs = cut_axis(
            geometry.tile_span_x(tile_x),
            start.x,
            end.x,
            grid.source_origin.x,
            grid.scale_x,
            grid.destination.x,
        );
        let ys = cut_axis(
            geometry.tile_span_y(tile_y),
            start.y,
            end.y,
            grid.source_origin.y,
            grid.scale_y,
            grid.destination.y,
        );

        Self {
            tile_x,
            tile_y,
            intra_x: xs.intra,
            intra_y: ys.intra,
            width: xs.len,
            height: ys.len,
            dest_x: xs.dest_start,
            dest_y: ys.dest_start,
            dest_width: xs.dest_len,
            dest_height: ys.dest_len,
            first_column: xs.first,
            first_row: ys.first,
            step_x: grid.scale_x,
            step_y: grid.scale_y,
        }
    }

    /// Whether the tile contributes no destination samples.
    pub fn is_empty(&self) -> bool {
        self.dest_width == 0 || self.dest_height == 0
    }

    /// Intra-tile row read for destination row `dest_y + k`.
    pub fn tile_row(&self, k: u32) -> u32 {
        self.intra_y + self.first_row + k * self.step_y
    }

    /// Index, within a requested footprint row, of destination column
    /// `dest_x + k`.
    pub fn row_index(&self, k: u32) -> usize {
        (self.first_column + k * self.step_x) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{CodestreamHeader, ComponentInfo};

    fn geometry(width: u32, height: u32, tw: u32, th: u32) -> ImageGeometry {
        let header =
            CodestreamHeader::tiled(width, height, tw, th, vec![ComponentInfo::unsigned(8)]);
        ImageGeometry::from_header(&header).unwrap()
    }

    #[test]
    fn test_grid_destination_size_is_ceiling() {
        let geometry = geometry(101, 50, 32, 32);
        let request = RegionRequest::full_image().subsampling(2, 3, 1, 0);
        let grid = SamplingGrid::new(&geometry, &request).unwrap();

        // 100 columns remain after the phase offset
        assert_eq!(grid.source_origin, Point::new(1, 0));
        assert_eq!(grid.destination, Rect::new(0, 0, 50, 17));
    }

    #[test]
    fn test_grid_clips_region_outside_image() {
        let geometry = geometry(64, 64, 32, 32);
        let request = RegionRequest::full_image().source_region(Rect::new(60, 60, 100, 100));
        let grid = SamplingGrid::new(&geometry, &request).unwrap();
        assert_eq!(grid.destination, Rect::new(0, 0, 4, 4));

        let request = RegionRequest::full_image().source_region(Rect::new(70, 0, 10, 10));
        assert!(SamplingGrid::new(&geometry, &request)
            .unwrap_err()
            .is_invalid_request());
    }

    #[test]
    fn test_identity_detection() {
        let geometry = geometry(64, 48, 32, 32);
        let grid = SamplingGrid::new(&geometry, &RegionRequest::full_image()).unwrap();
        assert!(grid.is_identity(&geometry));

        let request = RegionRequest::full_image().destination_offset(Point::new(1, 0));
        let grid = SamplingGrid::new(&geometry, &request).unwrap();
        assert!(!grid.is_identity(&geometry));
    }

    #[test]
    fn test_tile_range_clips_to_grid() {
        let geometry = geometry(256, 256, 64, 64);
        let request = RegionRequest::full_image().source_region(Rect::new(70, 10, 60, 200));
        let grid = SamplingGrid::new(&geometry, &request).unwrap();
        let range = grid.tile_range(&geometry, &grid.destination);

        assert_eq!(range, TileRange { start_x: 1, start_y: 0, end_x: 2, end_y: 3 });
        assert_eq!(range.count(), 8);
        let order: Vec<_> = range.iter().take(3).collect();
        assert_eq!(order, vec![(1, 0), (2, 0), (1, 1)]);
    }

    #[test]
    fn test_cursor_intra_tile_offset() {
        let geometry = geometry(256, 256, 64, 64);
        let request = RegionRequest::full_image().source_region(Rect::new(70, 10, 60, 20));
        let grid = SamplingGrid::new(&geometry, &request).unwrap();
        let clip = grid.destination;

        let cursor = TileCursor::compute(&geometry, &grid, &clip, 1, 0);
        assert_eq!((cursor.intra_x, cursor.intra_y), (6, 10));
        assert_eq!((cursor.width, cursor.height), (58, 20));
        assert_eq!((cursor.dest_x, cursor.dest_y), (0, 0));

        // Second tile starts at its native origin: no offset
        let cursor = TileCursor::compute(&geometry, &grid, &clip, 2, 0);
        assert_eq!(cursor.intra_x, 0);
        assert_eq!(cursor.width, 2);
        assert_eq!(cursor.dest_x, 58);
    }

    #[test]
    fn test_cursor_rounds_up_at_tile_edges() {
        // Tile edge at 5, scale 2 from origin 0: dest column 3 reads source 6
        let geometry = geometry(20, 1, 5, 1);
        let request = RegionRequest::full_image().subsampling(2, 1, 0, 0);
        let grid = SamplingGrid::new(&geometry, &request).unwrap();
        let clip = grid.destination;

        let first = TileCursor::compute(&geometry, &grid, &clip, 0, 0);
        assert_eq!((first.dest_x, first.dest_width), (0, 3));

        let second = TileCursor::compute(&geometry, &grid, &clip, 1, 0);
        assert_eq!((second.dest_x, second.dest_width), (3, 2));
        assert_eq!(second.first_column, 1);
    }

    /// Every destination column and row is produced by exactly one tile and
    /// maps back to `origin + d * scale`.
    #[test]
    fn test_cursors_partition_destination() {
        let cases = [
            (97u32, 61u32, 16u32, 13u32),
            (64, 64, 64, 64),
            (50, 33, 7, 5),
        ];

        for &(w, h, tw, th) in &cases {
            let geometry = geometry(w, h, tw, th);
            for scale_x in 1..=4 {
                for scale_y in 1..=3 {
                    for x_offset in 0..scale_x {
                        for region in [None, Some(Rect::new(3, 2, w / 2, h / 2))] {
                            let mut request = RegionRequest::full_image().subsampling(
                                scale_x, scale_y, x_offset, scale_y - 1,
                            );
                            request.source_region = region;
                            request.destination_offset = Point::new(2, 1);
                            let grid = SamplingGrid::new(&geometry, &request).unwrap();
                            check_partition(&geometry, &grid);
                        }
                    }
                }
            }
        }
    }

    fn check_partition(geometry: &ImageGeometry, grid: &SamplingGrid) {
        let clip = grid.destination;
        let range = grid.tile_range(geometry, &clip);
        let mut hits = vec![0u32; clip.width as usize * clip.height as usize];

        for (tx, ty) in range.iter() {
            let cursor = TileCursor::compute(geometry, grid, &clip, tx, ty);
            let tile = geometry.tile_rect(tx, ty);
            assert!(cursor.intra_x + cursor.width <= tile.width);
            assert!(cursor.intra_y + cursor.height <= tile.height);

            for j in 0..cursor.dest_height {
                let source_row = tile.y + cursor.tile_row(j);
                let dest_row = cursor.dest_y + j;
                assert_eq!(
                    source_row,
                    grid.source_origin.y + (dest_row - clip.y) * grid.scale_y
                );
                for k in 0..cursor.dest_width {
                    let index = cursor.row_index(k) as u32;
                    assert!(index < cursor.width);
                    let source_col = tile.x + cursor.intra_x + index;
                    let dest_col = cursor.dest_x + k;
                    assert_eq!(
                        source_col,
                        grid.source_origin.x + (dest_col - clip.x) * grid.scale_x
                    );
                    let cell = (dest_row - clip.y) * clip.width + (dest_col - clip.x);
                    hits[cell as usize] += 1;
                }
            }
        }

        assert!(hits.iter().all(|&n| n == 1), "gaps or overlaps in {:?}", grid);
    }
}
