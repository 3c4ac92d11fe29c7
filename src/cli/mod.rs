//! Command-line interface for the tiled reader.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{BatchDecoder, JobStatus, OutputFormat};
use crate::config::{Point, Rect, RegionRequest};
use crate::dump::SampleDump;
use crate::progress::{CallbackProgress, ChannelProgress, ProgressReceiver};
use crate::reader::{ReadSummary, SessionInfo};

/// Tiled JPEG 2000 raster reader
///
/// Reads regions of decoded sample dumps tile by tile, with optional
/// subsampling, band selection and destination placement.
#[derive(Parser, Debug)]
#[command(name = "j2kread")]
#[command(version)]
#[command(about = "Tiled, subsampled raster reads from JPEG 2000 sample dumps")]
#[command(long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Read parameters shared by `decode` and `batch`.
#[derive(clap::Args, Debug, Default)]
pub struct ReadArgs {
    /// Source region as x,y,width,height
    #[arg(long, value_parser = parse_rect)]
    pub region: Option<Rect>,

    /// Subsampling factors as sx,sy (or one factor for both axes)
    #[arg(long, value_parser = parse_pair)]
    pub scale: Option<(u32, u32)>,

    /// Subsampling phase as x,y
    #[arg(long, value_parser = parse_pair)]
    pub phase: Option<(u32, u32)>,

    /// Source bands in output order
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<usize>>,

    /// Destination band for each source band
    #[arg(long, value_delimiter = ',')]
    pub dest_bands: Option<Vec<usize>>,

    /// Destination offset as x,y
    #[arg(long, value_parser = parse_pair)]
    pub offset: Option<(u32, u32)>,
}

impl ReadArgs {
    /// Whether any read parameter was given.
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.scale.is_none()
            && self.phase.is_none()
            && self.bands.is_none()
            && self.dest_bands.is_none()
            && self.offset.is_none()
    }

    /// Layer the arguments over `base`.
    pub fn apply(&self, mut request: RegionRequest) -> RegionRequest {
        if let Some(region) = self.region {
            request.source_region = Some(region);
        }
        if let Some((sx, sy)) = self.scale {
            request.scale_x = sx;
            request.scale_y = sy;
        }
        if let Some((x, y)) = self.phase {
            request.x_offset = x;
            request.y_offset = y;
        }
        if let Some(ref bands) = self.bands {
            request.source_bands = Some(bands.clone());
        }
        if let Some(ref bands) = self.dest_bands {
            request.destination_bands = Some(bands.clone());
        }
        if let Some((x, y)) = self.offset {
            request.destination_offset = Point::new(x, y);
        }
        request
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read one region of a sample dump
    Decode {
        /// Dump descriptor (TOML)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (PNG, or big-endian samples with --raw)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        read: ReadArgs,

        /// Read a single tile given as tx,ty
        #[arg(long, value_parser = parse_pair, conflicts_with_all = ["region", "scale", "phase", "offset"])]
        tile: Option<(u32, u32)>,

        /// Write raw samples instead of PNG
        #[arg(long)]
        raw: bool,
    },

    /// Show image, tile and layout information for a sample dump
    Info {
        /// Dump descriptor (TOML)
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Decode every sample dump in a directory
    Batch {
        /// Input directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Scan subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        read: ReadArgs,

        /// Write raw samples instead of PNG
        #[arg(long)]
        raw: bool,
    },
}

fn parse_numbers(s: &str) -> Result<Vec<u32>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("'{}': {}", part, e))
        })
        .collect()
}

/// Parse `a,b`; a single value is used for both.
pub fn parse_pair(s: &str) -> Result<(u32, u32), String> {
    match parse_numbers(s)?.as_slice() {
        [v] => Ok((*v, *v)),
        [a, b] => Ok((*a, *b)),
        _ => Err(format!("expected one or two values, got '{}'", s)),
    }
}

/// Parse `x,y,width,height`.
pub fn parse_rect(s: &str) -> Result<Rect, String> {
    match parse_numbers(s)?.as_slice() {
        [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected x,y,width,height, got '{}'", s)),
    }
}

const BAR_STEPS: u64 = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bar on stderr, or a hidden one when `quiet`.
fn progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {percent:>3}% {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Drive `bar` from a read running on another thread until it returns.
fn follow(updates: &mut ProgressReceiver, bar: &ProgressBar) {
    while !updates.is_finished() {
        if updates.pump(POLL_INTERVAL) == 0 {
            continue;
        }
        bar.set_position((updates.fraction() * BAR_STEPS as f64) as u64);
        if let (Some(rows), Some((tx, ty))) = (updates.take_damage(), updates.current_tile()) {
            bar.set_message(format!("tile ({}, {}) rows {}", tx, ty, rows));
        }
    }

    match updates.outcome() {
        Some(Ok(summary)) => bar.finish_with_message(format!(
            "{} ({}/{} tiles)",
            summary.status, summary.tiles_processed, summary.total_tiles
        )),
        Some(Err(message)) => bar.abandon_with_message(message.clone()),
        None => bar.abandon(),
    }
}

/// Run the CLI application.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    match cli.command {
        Commands::Decode {
            input,
            output,
            read,
            tile,
            raw,
        } => run_decode(&input, &output, &read, tile, raw, cli.quiet),
        Commands::Info { input, json } => run_info(&input, json),
        Commands::Batch {
            input,
            output,
            recursive,
            jobs,
            read,
            raw,
        } => run_batch(&input, output, recursive, jobs, &read, raw, cli.quiet),
    }
}

fn load(input: &Path) -> anyhow::Result<SampleDump> {
    SampleDump::load(input).with_context(|| format!("Failed to load {}", input.display()))
}

/// Run decode command.
fn run_decode(
    input: &Path,
    output: &Path,
    args: &ReadArgs,
    tile: Option<(u32, u32)>,
    raw: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let dump = load(input)?;
    let base = dump.read.clone().unwrap_or_else(RegionRequest::full_image);
    let request = args.apply(base);

    let mut reader = dump.open()?;
    let (progress, mut updates) = ChannelProgress::new();
    let worker = thread::spawn(move || match tile {
        Some((tx, ty)) => reader.read_tile(tx, ty, &request, &progress),
        None => reader.decode_region(&request, None, &progress),
    });

    follow(&mut updates, &progress_bar(BAR_STEPS, quiet));
    let outcome = worker
        .join()
        .map_err(|_| anyhow!("Decode thread of {} panicked", input.display()))??;

    if outcome.status().is_aborted() {
        bail!("Read of {} was aborted", input.display());
    }

    if raw {
        let file = File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        outcome.raster.write_raw(BufWriter::new(file))?;
    } else {
        outcome
            .raster
            .to_dynamic_image()?
            .save(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    if !quiet {
        print_summary(&outcome.summary, output);
    }
    Ok(())
}

/// Run info command.
fn run_info(input: &Path, json: bool) -> anyhow::Result<()> {
    let reader = load(input)?.open()?;
    let info = reader.info()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(input, &info);
    }
    Ok(())
}

/// Run batch command.
fn run_batch(
    input: &Path,
    output: PathBuf,
    recursive: bool,
    jobs: Option<usize>,
    args: &ReadArgs,
    raw: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let bar = progress_bar(0, quiet);
    let counter = bar.clone();
    let progress = CallbackProgress::new().on_complete(move |_| counter.inc(1));

    let mut decoder = BatchDecoder::new(progress)
        .recursive(recursive)
        .output_dir(output)
        .format(if raw { OutputFormat::Raw } else { OutputFormat::Png });
    if let Some(n) = jobs {
        decoder = decoder.max_parallel(n);
    }
    if !args.is_empty() {
        decoder = decoder.request(args.apply(RegionRequest::full_image()));
    }

    let files = decoder.discover(input)?;
    bar.set_length(files.len() as u64);
    let (stats, results) = decoder.decode_files_under(&files, input)?;
    bar.finish_and_clear();

    if !quiet {
        for result in results.iter().filter(|r| r.status() != JobStatus::Completed) {
            println!("  {}", result);
        }
        println!("Batch Result:");
        println!("  Dumps: {}", stats.total_files);
        println!("  Decoded: {}", stats.successful);
        println!("  Aborted: {}", stats.aborted);
        println!("  Failed: {}", stats.failed);
        println!("  Tiles: {}", stats.tiles_processed);
        println!("  Time: {} ms", stats.total_time_ms);
    }

    if stats.failed > 0 {
        bail!("{} of {} dumps failed", stats.failed, stats.total_files);
    }
    Ok(())
}

fn print_summary(summary: &ReadSummary, output: &Path) {
    println!("Read Result:");
    println!("  Output: {}", output.display());
    println!("  Destination: {}", summary.destination);
    println!(
        "  Tiles: {}/{}",
        summary.tiles_processed, summary.total_tiles
    );
    if summary.progressive {
        println!("  Note: samples are from an incomplete progressive decode");
    }
}

fn print_info(input: &Path, info: &SessionInfo) {
    println!("Sample Dump Information");
    println!("=======================");
    println!("File: {}", input.display());
    println!();

    println!("Image:");
    println!("  Dimensions: {}x{}", info.width, info.height);
    println!(
        "  Subsampling: {}x{}",
        info.subsampling.0, info.subsampling.1
    );
    println!(
        "  Tiles: {}x{} of {}x{}",
        info.tiles_x, info.tiles_y, info.tile_width, info.tile_height
    );
    println!();

    println!("Components:");
    for c in &info.components {
        println!(
            "  {}: {} bits {}, range {}..={}{}",
            c.component,
            c.bit_depth,
            if c.signed { "signed" } else { "unsigned" },
            c.min,
            c.max,
            if c.fraction_bits > 0 {
                format!(", {} fraction bits", c.fraction_bits)
            } else {
                String::new()
            }
        );
    }
    if info.remapped_channels {
        println!("  Note: channel definitions reorder components");
    }
    println!();

    println!("Raster:");
    println!("  Layout: {:?} x {} bands", info.layout.kind, info.layout.bands);
    println!("  Color: {:?}", info.color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_pair("2"), Ok((2, 2)));
        assert_eq!(parse_pair("3,1"), Ok((3, 1)));
        assert!(parse_pair("1,2,3").is_err());
        assert!(parse_pair("x").is_err());
        assert_eq!(parse_rect("1, 2, 30, 40"), Ok(Rect::new(1, 2, 30, 40)));
        assert!(parse_rect("1,2").is_err());
    }

    #[test]
    fn test_decode_arguments() {
        let cli = Cli::try_parse_from([
            "j2kread", "decode", "-i", "scan.toml", "-o", "scan.png", "--scale", "2,3", "--phase",
            "1,0", "--bands", "2,0", "--offset", "4,4",
        ])
        .unwrap();

        let Commands::Decode { read, tile, .. } = cli.command else {
            panic!("expected decode");
        };
        assert!(tile.is_none());
        let request = read.apply(RegionRequest::full_image());
        assert_eq!((request.scale_x, request.scale_y), (2, 3));
        assert_eq!((request.x_offset, request.y_offset), (1, 0));
        assert_eq!(request.source_bands, Some(vec![2, 0]));
        assert_eq!(request.destination_offset, Point::new(4, 4));
    }

    #[test]
    fn test_tile_conflicts_with_transforms() {
        let parsed = Cli::try_parse_from([
            "j2kread", "decode", "-i", "a.toml", "-o", "a.png", "--tile", "0,0", "--scale", "2",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_arguments_layer_over_descriptor() {
        let base = RegionRequest::full_image().subsampling(4, 4, 1, 1);
        let args = ReadArgs {
            region: Some(Rect::new(0, 0, 8, 8)),
            ..Default::default()
        };
        let request = args.apply(base);
        assert_eq!(request.scale_x, 4);
        assert_eq!(request.source_region, Some(Rect::new(0, 0, 8, 8)));
        assert!(ReadArgs::default().is_empty());
    }
}
