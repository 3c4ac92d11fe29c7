use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::fill;
use super::*;
use crate::chain::{Fidelity, PlanarChain, TileWindow};
use crate::geometry::ceil_div;
use crate::header::{ChannelAssociation, ChannelType};
use crate::progress::{CallbackProgress, NullProgress, ProgressPhase};
use crate::raster::{resolve_sample_layout, SampleKind};

/// Planar chain that records what the reader asks of it.
struct RecordingChain {
    inner: PlanarChain,
    activations: Vec<(u32, u32)>,
    requests: usize,
    fail_on: Option<(u32, u32)>,
}

impl RecordingChain {
    fn new(inner: PlanarChain) -> Self {
        Self {
            inner,
            activations: Vec::new(),
            requests: 0,
            fail_on: None,
        }
    }

    fn failing_on(mut self, tile: (u32, u32)) -> Self {
        self.fail_on = Some(tile);
        self
    }
}

impl DecodeChain for RecordingChain {
    fn activate_tile(&mut self, tile_x: u32, tile_y: u32) -> Result<()> {
        self.activations.push((tile_x, tile_y));
        if self.fail_on == Some((tile_x, tile_y)) {
            return Err(ReaderError::Chain(format!(
                "Truncated codestream in tile ({}, {})",
                tile_x, tile_y
            )));
        }
        self.inner.activate_tile(tile_x, tile_y)
    }

    fn request_samples(
        &mut self,
        component: usize,
        window: TileWindow,
        out: &mut [i32],
    ) -> Result<Fidelity> {
        self.requests += 1;
        self.inner.request_samples(component, window, out)
    }
}

/// Stops the read once `rows` scanlines were reported.
struct CancelAfter {
    rows: usize,
    seen: AtomicUsize,
}

impl CancelAfter {
    fn new(rows: usize) -> Self {
        Self {
            rows,
            seen: AtomicUsize::new(0),
        }
    }
}

impl ProgressHandler for CancelAfter {
    fn on_progress(&self, event: &ProgressEvent) {
        if event.phase == ProgressPhase::Decoding {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.seen.load(Ordering::SeqCst) >= self.rows
    }
}

fn pattern(c: usize, x: u32, y: u32) -> i32 {
    (c as i32 * 211 + (y as i32 * 37 + x as i32 * 11) % 251) - 120
}

fn reader_for(header: CodestreamHeader) -> TileReader<RecordingChain> {
    let chain = PlanarChain::from_fn(&header, pattern).unwrap();
    TileReader::new(header, RecordingChain::new(chain)).unwrap()
}

/// Expected destination samples computed straight from the planes.
fn check_against_planes(reader: &TileReader<RecordingChain>, request: &RegionRequest, raster: &Raster) {
    let geometry = reader.geometry();
    let (width, height) = (geometry.width(), geometry.height());
    let region = request
        .source_region
        .unwrap_or(Rect::with_size(width, height))
        .intersection(&Rect::with_size(width, height));

    let origin_x = region.x + request.x_offset;
    let origin_y = region.y + request.y_offset;
    let dest_w = ceil_div((region.width - request.x_offset) as u64, request.scale_x as u64) as u32;
    let dest_h = ceil_div((region.height - request.y_offset) as u64, request.scale_y as u64) as u32;

    let source_bands = request.resolved_source_bands(reader.header().num_components());
    let dest_bands = request.resolved_destination_bands(source_bands.len());
    let descriptors = reader.descriptors(&source_bands);
    let planes = reader.chain().inner.planes();

    for (descriptor, &band) in descriptors.iter().zip(&dest_bands) {
        let normalizer = descriptor.normalizer();
        let plane = &planes[descriptor.component];
        for dy in 0..dest_h {
            for dx in 0..dest_w {
                let sx = origin_x + dx * request.scale_x;
                let sy = origin_y + dy * request.scale_y;
                let raw = plane[(sy * width + sx) as usize];
                let at = (
                    request.destination_offset.x + dx,
                    request.destination_offset.y + dy,
                );
                assert_eq!(
                    raster.sample(at.0, at.1, band),
                    Some(normalizer.sample(raw)),
                    "destination ({}, {}) band {} for {:?}",
                    at.0,
                    at.1,
                    band,
                    request
                );
            }
        }
    }
}

#[test]
fn test_scenario_full_image_of_square_tiles() {
    let header = CodestreamHeader::tiled(256, 256, 64, 64, vec![ComponentInfo::unsigned(8)]);
    let chain = PlanarChain::from_fn(&header, |_, x, y| ((x * 7 + y * 3) % 300) as i32 - 150).unwrap();
    let mut reader = TileReader::new(header, RecordingChain::new(chain)).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.raster.width(), 64 * 4);
    assert_eq!(outcome.raster.height(), 64 * 4);
    assert_eq!(outcome.raster.layout().kind, SampleKind::Byte);

    for y in 0..256 {
        for x in 0..256 {
            let raw = ((x * 7 + y * 3) % 300) as i32 - 150;
            assert_eq!(outcome.raster.sample(x, y, 0), Some((raw + 128).clamp(0, 255)));
        }
    }

    let expected: Vec<(u32, u32)> = (0..4).flat_map(|ty| (0..4).map(move |tx| (tx, ty))).collect();
    assert_eq!(reader.chain().activations, expected);
    assert_eq!(outcome.summary.tiles_processed, 16);
}

#[test]
fn test_scenario_subsampled_signed_with_phase() {
    let header = CodestreamHeader::tiled(100, 8, 32, 4, vec![ComponentInfo::signed(12); 3]);
    let chain =
        PlanarChain::from_fn(&header, |c, x, y| c as i32 * 100 + x as i32 * 10 + y as i32).unwrap();
    let mut reader = TileReader::new(header, RecordingChain::new(chain)).unwrap();

    let request = RegionRequest::full_image().subsampling(2, 1, 1, 0);
    let outcome = reader.decode_region(&request, None, NullProgress).unwrap();
    let raster = &outcome.raster;

    assert_eq!(raster.width(), 50);
    assert_eq!(raster.layout().kind, SampleKind::Short { signed: true });
    for c in 0..3 {
        for y in 0..8 {
            // Column 0 reads source column 1, not 0
            assert_eq!(raster.sample(0, y, c), Some(c as i32 * 100 + 10 + y as i32));
            assert_eq!(raster.sample(49, y, c), Some(c as i32 * 100 + 990 + y as i32));
        }
    }
}

#[test]
fn test_scenario_bilevel_row_packs_msb_first() {
    // Unsigned 1-bit samples arrive centered: -1 is black, 0 is white
    let header = CodestreamHeader::single_tile(8, 2, vec![ComponentInfo::unsigned(1)]);
    let bits = [1, 0, 1, 1, 0, 0, 1, 0];
    let chain = PlanarChain::from_fn(&header, |_, x, _| bits[x as usize] - 1).unwrap();
    let mut reader = TileReader::new(header, chain).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert!(outcome.raster.layout().is_bilevel());
    assert_eq!(outcome.raster.packed_row(0).unwrap(), &[0xB2]);
    assert_eq!(outcome.raster.packed_row(1).unwrap(), &[0xB2]);
}

#[test]
fn test_bilevel_forces_unit_range_for_signed_data() {
    let header = CodestreamHeader::single_tile(8, 1, vec![ComponentInfo::signed(1)]);
    let raw = [1, 0, 1, 1, 0, 0, 1, 0];
    let chain = PlanarChain::from_fn(&header, |_, x, _| raw[x as usize]).unwrap();
    let mut reader = TileReader::new(header, chain).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert_eq!(outcome.raster.packed_row(0).unwrap(), &[0xB2]);
}

#[test]
fn test_packed_nibble_layout() {
    let header = CodestreamHeader::tiled(9, 3, 4, 2, vec![ComponentInfo::unsigned(4)]);
    let mut reader = reader_for(header);

    let request = RegionRequest::full_image();
    let outcome = reader.decode_region(&request, None, NullProgress).unwrap();
    assert_eq!(outcome.raster.layout().kind, SampleKind::Packed { bits: 4 });
    check_against_planes(&reader, &request, &outcome.raster);
}

#[test]
fn test_direct_and_subsampled_walks_agree() {
    let headers = vec![
        CodestreamHeader::tiled(97, 61, 16, 13, vec![ComponentInfo::unsigned(8); 3]),
        CodestreamHeader::tiled(33, 20, 8, 8, vec![ComponentInfo::signed(16)]),
        CodestreamHeader::tiled(19, 7, 5, 3, vec![ComponentInfo::unsigned(1)]),
        {
            let mut h = CodestreamHeader::tiled(70, 50, 32, 32, vec![ComponentInfo::unsigned(12); 2]);
            h.image_x0 = 9;
            h.image_y0 = 4;
            h
        },
    ];

    for header in headers {
        let mut reader = reader_for(header);
        let (mut direct, plan) = reader.prepare(&RegionRequest::full_image(), None).unwrap();
        let plan = plan.unwrap();
        let mut general = direct.clone();

        let a = fill::fill_direct(
            &reader.geometry,
            &mut reader.chain,
            &mut reader.lines,
            &plan,
            &mut direct,
            &NullProgress,
        )
        .unwrap();
        let b = fill::fill_subsampled(
            &reader.geometry,
            &mut reader.chain,
            &mut reader.lines,
            &plan,
            &mut general,
            &NullProgress,
        )
        .unwrap();

        assert_eq!(direct, general);
        assert_eq!(a.tiles_processed, b.tiles_processed);

        let outcome = reader.decode_full_image(NullProgress).unwrap();
        assert_eq!(outcome.raster, direct);
    }
}

#[test]
fn test_subsampled_reads_match_planes_at_tile_edges() {
    let mut headers = vec![
        CodestreamHeader::tiled(97, 61, 16, 13, vec![ComponentInfo::unsigned(8)]),
        CodestreamHeader::tiled(50, 33, 7, 5, vec![ComponentInfo::signed(12).with_fraction_bits(1); 2]),
    ];
    let mut origin = CodestreamHeader::tiled(
        64,
        40,
        20,
        20,
        vec![ComponentInfo::unsigned(10).with_subsampling(2, 2); 2],
    );
    origin.image_x0 = 5;
    origin.image_y0 = 5;
    origin.tile_x0 = 2;
    origin.tile_y0 = 1;
    headers.push(origin);

    for header in headers {
        let mut reader = reader_for(header);
        let (gw, gh) = (reader.geometry().width(), reader.geometry().height());

        for scale_x in 1..=3 {
            for scale_y in 1..=2 {
                for x_offset in 0..scale_x {
                    for region in [None, Some(Rect::new(5, 3, gw / 2, gh / 2))] {
                        let mut request = RegionRequest::full_image()
                            .subsampling(scale_x, scale_y, x_offset, scale_y - 1)
                            .destination_offset(Point::new(3, 2));
                        request.source_region = region;

                        let outcome = reader.decode_region(&request, None, NullProgress).unwrap();
                        assert!(outcome.is_complete());
                        check_against_planes(&reader, &request, &outcome.raster);
                    }
                }
            }
        }
    }
}

#[test]
fn test_repeated_reads_are_deterministic() {
    let header = CodestreamHeader::tiled(80, 60, 24, 24, vec![ComponentInfo::unsigned(8); 3]);
    let mut reader = reader_for(header);
    let request = RegionRequest::full_image()
        .source_region(Rect::new(7, 5, 50, 40))
        .subsampling(3, 2, 2, 1);

    let first = reader.decode_region(&request, None, NullProgress).unwrap();
    // A wider read in between leaves different contents in the line buffers
    reader.decode_full_image(NullProgress).unwrap();
    let second = reader.decode_region(&request, None, NullProgress).unwrap();

    assert_eq!(first.raster, second.raster);
}

#[test]
fn test_cancellation_stops_within_one_scanline() {
    for (rows, tiles_done) in [(5usize, 0usize), (40, 1)] {
        let header = CodestreamHeader::tiled(64, 64, 32, 32, vec![ComponentInfo::unsigned(8)]);
        let chain = PlanarChain::from_fn(&header, |_, _, _| 10).unwrap();
        let mut reader = TileReader::new(header, RecordingChain::new(chain)).unwrap();

        let progress = CancelAfter::new(rows);
        let outcome = reader.decode_full_image(&progress).unwrap();

        assert_eq!(outcome.status(), ReadStatus::Aborted);
        assert_eq!(reader.chain().requests, rows);
        assert_eq!(outcome.summary.tiles_processed, tiles_done);
    }

    let header = CodestreamHeader::tiled(64, 64, 32, 32, vec![ComponentInfo::unsigned(8)]);
    let chain = PlanarChain::from_fn(&header, |_, _, _| 10).unwrap();
    let mut reader = TileReader::new(header, RecordingChain::new(chain)).unwrap();
    let outcome = reader.decode_full_image(CancelAfter::new(5)).unwrap();

    // Rows already delivered stay in the raster
    assert_eq!(outcome.raster.sample(0, 4, 0), Some(138));
    assert_eq!(outcome.raster.sample(0, 5, 0), Some(0));
}

#[test]
fn test_cancellation_counts_every_band() {
    let header = CodestreamHeader::tiled(16, 16, 8, 8, vec![ComponentInfo::unsigned(8); 3]);
    let mut reader = reader_for(header);
    let outcome = reader.decode_full_image(CancelAfter::new(3)).unwrap();
    assert!(outcome.status().is_aborted());
    assert_eq!(reader.chain().requests, 3 * 3);
}

#[test]
fn test_cancel_before_start_touches_nothing() {
    let header = CodestreamHeader::tiled(16, 16, 8, 8, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);
    let progress = CallbackProgress::new();
    progress.cancel();

    let outcome = reader.decode_full_image(&progress).unwrap();
    assert!(outcome.status().is_aborted());
    assert!(reader.chain().activations.is_empty());
}

#[test]
fn test_progress_is_monotonic() {
    let header = CodestreamHeader::tiled(90, 70, 32, 32, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    let events = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));
    let sink = events.clone();
    let done = completions.clone();
    let progress = CallbackProgress::new()
        .on_event(move |event| sink.lock().unwrap().push(event.clone()))
        .on_complete(move |summary| {
            assert!(summary.status.is_complete());
            done.fetch_add(1, Ordering::SeqCst);
        });

    let request = RegionRequest::full_image()
        .source_region(Rect::new(10, 10, 70, 55))
        .subsampling(2, 3, 1, 2);
    let outcome = reader.decode_region(&request, None, &progress).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events[0].phase, ProgressPhase::Started);
    assert_eq!(events[0].total_tiles, outcome.summary.total_tiles);

    let fractions: Vec<f64> = events
        .iter()
        .filter(|e| e.phase == ProgressPhase::Decoding)
        .map(|e| e.fraction)
        .collect();
    assert_eq!(
        fractions.len(),
        events.iter().filter(|e| e.updated.is_some()).count()
    );
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert!((fractions[fractions.len() - 1] - 1.0).abs() < 1e-9);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_chain_errors_abort_the_read() {
    let header = CodestreamHeader::tiled(64, 32, 32, 32, vec![ComponentInfo::unsigned(8)]);
    let chain = PlanarChain::from_fn(&header, pattern).unwrap();
    let chain = RecordingChain::new(chain).failing_on((1, 0));
    let mut reader = TileReader::new(header, chain).unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let seen = errors.clone();
    let progress = CallbackProgress::new().on_error(move |e| {
        assert!(e.is_chain());
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let err = reader.decode_full_image(&progress).unwrap_err();
    assert!(err.is_chain());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(reader.chain().activations, vec![(0, 0), (1, 0)]);
}

#[test]
fn test_invalid_requests_touch_no_tile() {
    let header = CodestreamHeader::tiled(32, 32, 16, 16, vec![ComponentInfo::unsigned(8); 2]);
    let mut reader = reader_for(header);

    let requests = vec![
        RegionRequest::full_image().subsampling(0, 1, 0, 0),
        RegionRequest::full_image().subsampling(2, 2, 2, 0),
        RegionRequest::full_image().source_bands(vec![0, 1]).destination_bands(vec![0]),
        RegionRequest::full_image().source_bands(vec![2]),
        RegionRequest::full_image().source_region(Rect::new(40, 0, 8, 8)),
        RegionRequest::full_image().source_bands(vec![0]).destination_bands(vec![3]),
    ];

    for request in requests {
        let err = reader.decode_region(&request, None, NullProgress).unwrap_err();
        assert!(err.is_invalid_request(), "{:?} gave {}", request, err);
    }
    assert!(reader.chain().activations.is_empty());
}

#[test]
fn test_destination_offset_must_fit_coordinates() {
    let header = CodestreamHeader::single_tile(8, 2, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    for offset in [Point::new(u32::MAX - 3, 0), Point::new(0, u32::MAX)] {
        let request = RegionRequest::full_image().destination_offset(offset);
        let err = reader.decode_region(&request, None, NullProgress).unwrap_err();
        assert!(err.is_invalid_request(), "{:?} gave {}", offset, err);
    }
    assert!(reader.chain().activations.is_empty());

    // Ending exactly at the last coordinate is still addressable
    let edge = RegionRequest::full_image().destination_offset(Point::new(u32::MAX - 8, u32::MAX - 2));
    let outcome = reader.decode_region(&edge, None, NullProgress).unwrap();
    assert_eq!(outcome.summary.destination, Rect::new(u32::MAX - 8, u32::MAX - 2, 8, 2));
    check_against_planes(&reader, &edge, &outcome.raster);
}

#[test]
fn test_configuration_errors_at_open() {
    let header = CodestreamHeader::single_tile(8, 8, vec![ComponentInfo::unsigned(33)]);
    let chain = PlanarChain::from_fn(&CodestreamHeader::single_tile(8, 8, vec![ComponentInfo::unsigned(8)]), pattern).unwrap();
    let err = TileReader::new(header, chain.clone()).err().unwrap();
    assert!(matches!(err, ReaderError::UnsupportedBitDepth(33)));

    let mixed = CodestreamHeader::single_tile(
        8,
        8,
        vec![ComponentInfo::unsigned(8), ComponentInfo::unsigned(8).with_subsampling(2, 2)],
    );
    assert!(TileReader::new(mixed, chain.clone()).err().unwrap().is_configuration());

    let bad_cdef = CodestreamHeader::single_tile(8, 8, vec![ComponentInfo::unsigned(8)])
        .with_channel_definitions(vec![ChannelAssociation::new(ChannelType::Color, 0, 3)]);
    let err = TileReader::new(bad_cdef, chain).err().unwrap();
    assert!(matches!(err, ReaderError::ChannelDefinition(_)));
}

#[test]
fn test_supplied_destination_is_clipped() {
    let header = CodestreamHeader::tiled(40, 40, 16, 16, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);
    let full = reader.decode_full_image(NullProgress).unwrap().raster;

    let layout = resolve_sample_layout(1, 8, false).unwrap();
    let target = Raster::new(layout, 10, 10).unwrap().with_origin(Point::new(5, 5));
    let outcome = reader
        .decode_region(&RegionRequest::full_image(), Some(target), NullProgress)
        .unwrap();

    assert_eq!(outcome.summary.destination, Rect::new(5, 5, 10, 10));
    for y in 5..15 {
        for x in 5..15 {
            assert_eq!(outcome.raster.sample(x, y, 0), full.sample(x, y, 0));
        }
    }
}

#[test]
fn test_destination_offset_into_supplied_raster() {
    let header = CodestreamHeader::tiled(40, 40, 16, 16, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);
    let full = reader.decode_full_image(NullProgress).unwrap().raster;

    let layout = resolve_sample_layout(1, 8, false).unwrap();
    let target = Raster::new(layout, 20, 20).unwrap();
    let request = RegionRequest::full_image().destination_offset(Point::new(10, 10));
    let outcome = reader.decode_region(&request, Some(target), NullProgress).unwrap();

    assert_eq!(outcome.raster.sample(9, 9, 0), Some(0));
    assert_eq!(outcome.raster.sample(10, 10, 0), full.sample(0, 0, 0));
    assert_eq!(outcome.raster.sample(19, 19, 0), full.sample(9, 9, 0));
}

#[test]
fn test_disjoint_destination_is_returned_untouched() {
    let header = CodestreamHeader::tiled(40, 40, 16, 16, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    let layout = resolve_sample_layout(1, 8, false).unwrap();
    let target = Raster::new(layout, 8, 8).unwrap().with_origin(Point::new(100, 100));
    let outcome = reader
        .decode_region(&RegionRequest::full_image(), Some(target.clone()), NullProgress)
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.raster, target);
    assert!(reader.chain().activations.is_empty());
}

#[test]
fn test_destination_layout_must_match() {
    let header = CodestreamHeader::tiled(16, 16, 8, 8, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    let layout = resolve_sample_layout(1, 16, false).unwrap();
    let target = Raster::new(layout, 16, 16).unwrap();
    let err = reader
        .decode_region(&RegionRequest::full_image(), Some(target), NullProgress)
        .unwrap_err();
    assert!(matches!(err, ReaderError::Raster(_)));
}

#[test]
fn test_band_selection_and_remap() {
    let header = CodestreamHeader::tiled(20, 10, 8, 8, vec![ComponentInfo::unsigned(8); 3]);
    let mut reader = reader_for(header);

    let request = RegionRequest::full_image()
        .source_bands(vec![2, 0])
        .destination_bands(vec![1, 0]);
    let outcome = reader.decode_region(&request, None, NullProgress).unwrap();

    assert_eq!(outcome.raster.bands(), 2);
    check_against_planes(&reader, &request, &outcome.raster);
    let component_2 = ComponentDescriptor::new(2, &ComponentInfo::unsigned(8)).normalizer();
    assert_eq!(outcome.raster.sample(3, 4, 1), Some(component_2.sample(pattern(2, 3, 4))));
}

#[test]
fn test_channel_definitions_redirect_bands() {
    let header = CodestreamHeader::tiled(12, 12, 8, 8, vec![ComponentInfo::unsigned(8); 3])
        .with_channel_definitions(vec![
            ChannelAssociation::new(ChannelType::Color, 0, 2),
            ChannelAssociation::new(ChannelType::Color, 2, 0),
        ]);
    let mut reader = reader_for(header);
    assert!(!reader.channel_map().is_identity());

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    let n = ComponentDescriptor::new(0, &ComponentInfo::unsigned(8)).normalizer();
    assert_eq!(outcome.raster.sample(5, 6, 0), Some(n.sample(pattern(2, 5, 6))));
    assert_eq!(outcome.raster.sample(5, 6, 1), Some(n.sample(pattern(1, 5, 6))));
    assert_eq!(outcome.raster.sample(5, 6, 2), Some(n.sample(pattern(0, 5, 6))));
}

#[test]
fn test_palette_disables_channel_map() {
    let mut header = CodestreamHeader::tiled(12, 12, 8, 8, vec![ComponentInfo::unsigned(8); 3])
        .with_channel_definitions(vec![ChannelAssociation::new(ChannelType::Color, 0, 2)]);
    header.has_palette = true;
    let reader = reader_for(header);
    assert!(reader.channel_map().is_identity());
}

#[test]
fn test_read_tile_positions_raster() {
    let header = CodestreamHeader::tiled(100, 70, 64, 64, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    let outcome = reader
        .read_tile(1, 1, &RegionRequest::full_image(), NullProgress)
        .unwrap();
    assert_eq!(outcome.raster.bounds(), Rect::new(64, 64, 36, 6));
    assert_eq!(reader.chain().activations, vec![(1, 1)]);

    let n = ComponentDescriptor::new(0, &ComponentInfo::unsigned(8)).normalizer();
    assert_eq!(outcome.raster.sample(64, 64, 0), Some(n.sample(pattern(0, 64, 64))));
    assert_eq!(outcome.raster.sample(99, 69, 0), Some(n.sample(pattern(0, 99, 69))));
}

#[test]
fn test_read_tile_rejects_transforms_and_bad_indices() {
    let header = CodestreamHeader::tiled(100, 70, 64, 64, vec![ComponentInfo::unsigned(8)]);
    let mut reader = reader_for(header);

    let scaled = RegionRequest::full_image().subsampling(2, 1, 0, 0);
    assert!(reader.read_tile(0, 0, &scaled, NullProgress).unwrap_err().is_invalid_request());

    let offset = RegionRequest::full_image().destination_offset(Point::new(1, 1));
    assert!(reader.read_tile(0, 0, &offset, NullProgress).unwrap_err().is_invalid_request());

    let full = RegionRequest::full_image();
    assert!(reader.read_tile(2, 0, &full, NullProgress).unwrap_err().is_invalid_request());
}

#[test]
fn test_progressive_samples_are_flagged() {
    let header = CodestreamHeader::tiled(16, 16, 8, 8, vec![ComponentInfo::unsigned(8)]);
    let chain = PlanarChain::from_fn(&header, pattern)
        .unwrap()
        .with_fidelity(Fidelity::Progressive);
    let mut reader = TileReader::new(header, chain).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert!(outcome.is_complete());
    assert!(outcome.is_progressive());
}

#[test]
fn test_fraction_bits_are_removed() {
    let header = CodestreamHeader::tiled(
        8,
        4,
        4,
        4,
        vec![ComponentInfo::signed(12).with_fraction_bits(3)],
    );
    let chain = PlanarChain::from_fn(&header, |_, x, y| ((x as i32 - 4) * 100 + y as i32) << 3).unwrap();
    let mut reader = TileReader::new(header, chain).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert_eq!(outcome.raster.sample(0, 2, 0), Some(-398));
    assert_eq!(outcome.raster.sample(7, 1, 0), Some(301));
}

#[test]
fn test_unsigned_32_bit_saturates() {
    let header = CodestreamHeader::single_tile(3, 1, vec![ComponentInfo::unsigned(32)]);
    let raw = [i32::MIN, -1, 0];
    let chain = PlanarChain::from_fn(&header, |_, x, _| raw[x as usize]).unwrap();
    let mut reader = TileReader::new(header, chain).unwrap();

    let outcome = reader.decode_full_image(NullProgress).unwrap();
    assert_eq!(outcome.raster.layout().kind, SampleKind::Int);
    assert_eq!(outcome.raster.sample(0, 0, 0), Some(0));
    assert_eq!(outcome.raster.sample(1, 0, 0), Some(i32::MAX));
    assert_eq!(outcome.raster.sample(2, 0, 0), Some(i32::MAX));
}

#[test]
fn test_descriptor_ranges() {
    let d = ComponentDescriptor::new(0, &ComponentInfo::unsigned(12));
    assert_eq!((d.min, d.max, d.level_shift), (0, 4095, 2048));

    let d = ComponentDescriptor::new(0, &ComponentInfo::signed(16));
    assert_eq!((d.min, d.max, d.level_shift), (-32768, 32767, 0));
}

#[test]
fn test_read_image_and_info() {
    let header = CodestreamHeader::tiled(30, 20, 16, 16, vec![ComponentInfo::unsigned(8); 3]);
    let mut reader = reader_for(header);

    let image = reader
        .read_image(&RegionRequest::full_image().subsampling(2, 2, 0, 0), NullProgress)
        .unwrap();
    assert_eq!(image.color, ColorDescription::Rgb);
    assert_eq!((image.raster.width(), image.raster.height()), (15, 10));

    let info = reader.info().unwrap();
    assert_eq!((info.tiles_x, info.tiles_y), (2, 2));
    assert_eq!(info.components.len(), 3);
    assert_eq!(info.layout.kind, SampleKind::Byte);

    let json = serde_json::to_string(&info).unwrap();
    assert!(json.contains("\"width\":30"));
    assert!(json.contains("\"model\":\"rgb\""));
}
