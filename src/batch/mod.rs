//! Batch decoding of many sample dumps.
//!
//! Each dump gets its own reader session on a worker of a `rayon` pool;
//! sessions are never shared between threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use j2k_tile_reader::batch::BatchDecoder;
//! use j2k_tile_reader::progress::NullProgress;
//! use std::path::{Path, PathBuf};
//!
//! let decoder = BatchDecoder::new(NullProgress)
//!     .max_parallel(4)
//!     .recursive(true)
//!     .output_dir(PathBuf::from("./decoded"));
//!
//! let stats = decoder.decode_directory(Path::new("./dumps"))?;
//! println!("Decoded {} of {} dumps", stats.successful, stats.total_files);
//! ```

mod file_discovery;
mod job;

pub use file_discovery::{discover_files, FileDiscovery};
pub use job::{BatchJob, JobResult, JobStatus};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RegionRequest;
use crate::dump::SampleDump;
use crate::error::{ReaderError, Result};
use crate::progress::{CancelToken, NullProgress, ProgressEvent, ProgressHandler};
use crate::reader::{ReadStatus, ReadSummary};

/// File format for decoded rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// PNG through the `image` crate.
    #[default]
    Png,
    /// Big-endian samples exactly as stored in the raster.
    Raw,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Raw => "raw",
        }
    }
}

/// Aggregate counts for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    /// Dumps found.
    pub total_files: usize,
    /// Dumps decoded and written.
    pub successful: usize,
    /// Reads that observed cancellation.
    pub aborted: usize,
    /// Dumps that failed to load, read or write.
    pub failed: usize,
    /// Dumps never started.
    pub cancelled: usize,
    /// Tiles read over all dumps.
    pub tiles_processed: usize,
    /// Wall time in milliseconds.
    pub total_time_ms: u64,
}

impl BatchStats {
    /// Fraction of dumps decoded successfully.
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_files as f64
        }
    }

    fn record(&mut self, result: &JobResult) {
        match result.status() {
            JobStatus::Completed => self.successful += 1,
            JobStatus::Aborted => self.aborted += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled | JobStatus::Pending => self.cancelled += 1,
        }
        self.tiles_processed += result.tiles_processed();
    }
}

/// Per-job handler that also stops on the batch's own cancel flag.
struct JobProgress<'a, P: ProgressHandler> {
    inner: &'a P,
    cancelled: &'a CancelToken,
}

impl<P: ProgressHandler> ProgressHandler for JobProgress<'_, P> {
    fn on_progress(&self, event: &ProgressEvent) {
        self.inner.on_progress(event);
    }

    fn on_error(&self, error: &ReaderError) {
        self.inner.on_error(error);
    }

    fn on_complete(&self, summary: &ReadSummary) {
        self.inner.on_complete(summary);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled() || self.inner.is_cancelled()
    }
}

/// Decoder for directories or lists of sample dumps.
pub struct BatchDecoder<P: ProgressHandler> {
    /// Read applied to every dump; falls back to the dump's own `[read]`
    /// table, then to the full image.
    request: Option<RegionRequest>,

    /// Handler shared by every read.
    progress: P,

    /// Maximum parallel jobs.
    max_parallel: usize,

    /// Whether to scan directories recursively.
    recursive: bool,

    /// Descriptor patterns.
    patterns: Vec<String>,

    /// Output directory; outputs land beside the descriptors without one.
    output_dir: Option<PathBuf>,

    /// Whether to mirror the input tree under the output directory.
    preserve_structure: bool,

    format: OutputFormat,

    cancelled: CancelToken,
}

impl<P: ProgressHandler> BatchDecoder<P> {
    /// Create a decoder using every CPU.
    pub fn new(progress: P) -> Self {
        Self {
            request: None,
            progress,
            max_parallel: num_cpus::get(),
            recursive: false,
            patterns: vec!["*.toml".to_string()],
            output_dir: None,
            preserve_structure: true,
            format: OutputFormat::Png,
            cancelled: CancelToken::new(),
        }
    }

    /// Apply `request` to every dump.
    pub fn request(mut self, request: RegionRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Set maximum parallel jobs.
    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Enable recursive directory scanning.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set descriptor patterns (replaces existing).
    pub fn patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Set output directory.
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }

    /// Set whether to preserve directory structure.
    pub fn preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    /// Set the output file format.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Token that cancels the batch, shareable with other threads.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancelled.clone()
    }

    /// Request cancellation of batch processing.
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled() || self.progress.is_cancelled()
    }

    /// Descriptors under `input_dir` matching the configured patterns.
    pub fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        let files = FileDiscovery::new()
            .recursive(self.recursive)
            .patterns(self.patterns.clone())
            .discover(input_dir)?;

        if files.is_empty() {
            return Err(ReaderError::InvalidRequest(format!(
                "No sample dumps found in {}",
                input_dir.display()
            )));
        }
        Ok(files)
    }

    /// Decode every matching dump under `input_dir`.
    pub fn decode_directory(&self, input_dir: &Path) -> Result<BatchStats> {
        let files = self.discover(input_dir)?;
        self.decode_all(&files, Some(input_dir)).map(|(stats, _)| stats)
    }

    /// Decode descriptors discovered under `base_dir`, mirroring their
    /// layout below the output directory.
    pub fn decode_files_under(
        &self,
        files: &[PathBuf],
        base_dir: &Path,
    ) -> Result<(BatchStats, Vec<JobResult>)> {
        if files.is_empty() {
            return Err(ReaderError::InvalidRequest("No sample dumps to decode".into()));
        }
        self.decode_all(files, Some(base_dir))
    }

    /// Decode the given descriptors.
    pub fn decode_files(&self, files: &[PathBuf]) -> Result<(BatchStats, Vec<JobResult>)> {
        if files.is_empty() {
            return Err(ReaderError::InvalidRequest("No sample dumps to decode".into()));
        }
        self.decode_all(files, None)
    }

    fn decode_all(
        &self,
        files: &[PathBuf],
        base_dir: Option<&Path>,
    ) -> Result<(BatchStats, Vec<JobResult>)> {
        let start = Instant::now();
        info!(
            "Decoding {} dumps on {} workers",
            files.len(),
            self.max_parallel
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
            .map_err(|e| ReaderError::Internal(e.to_string()))?;

        let results: Vec<JobResult> = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .map(|(idx, file)| {
                    let mut job = BatchJob::new(idx as u64, file.clone());
                    if let Some(out) = self.output_path(file, base_dir) {
                        job = job.with_output(out);
                    }
                    if self.is_cancelled() {
                        return JobResult::cancelled(job);
                    }
                    self.decode_one(job)
                })
                .collect()
        });

        let mut stats = BatchStats {
            total_files: files.len(),
            ..Default::default()
        };
        for result in &results {
            stats.record(result);
            if let Some(ref e) = result.error {
                warn!("{}: {}", result.job.source_path.display(), e);
            }
        }
        stats.total_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Batch finished: {} decoded, {} aborted, {} failed, {} cancelled",
            stats.successful, stats.aborted, stats.failed, stats.cancelled
        );
        Ok((stats, results))
    }

    fn decode_one(&self, job: BatchJob) -> JobResult {
        let start = Instant::now();
        let outcome = self.run(&job);
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(summary) => JobResult {
                job,
                summary: Some(summary),
                error: None,
                duration_ms,
            },
            Err(e) => JobResult {
                job,
                summary: None,
                error: Some(e),
                duration_ms,
            },
        }
    }

    fn run(&self, job: &BatchJob) -> Result<ReadSummary> {
        let dump = SampleDump::load(&job.source_path)?;
        let request = self
            .request
            .clone()
            .or_else(|| dump.read.clone())
            .unwrap_or_else(RegionRequest::full_image);

        let mut reader = dump.open()?;
        let progress = JobProgress {
            inner: &self.progress,
            cancelled: &self.cancelled,
        };
        let outcome = reader.decode_region(&request, None, progress)?;
        if outcome.status() == ReadStatus::Aborted {
            return Ok(outcome.summary);
        }

        let output = job
            .output_path
            .clone()
            .unwrap_or_else(|| job.source_path.with_extension(self.format.extension()));
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.format {
            OutputFormat::Png => outcome.raster.to_dynamic_image()?.save(&output)?,
            OutputFormat::Raw => outcome.raster.write_raw(BufWriter::new(File::create(&output)?))?,
        }
        info!("Wrote {}", output.display());

        Ok(outcome.summary)
    }

    fn output_path(&self, file: &Path, base_dir: Option<&Path>) -> Option<PathBuf> {
        let output_dir = self.output_dir.as_ref()?;

        let relative = match base_dir {
            Some(base) if self.preserve_structure => file.strip_prefix(base).ok(),
            _ => None,
        };
        let relative = relative
            .map(Path::to_path_buf)
            .or_else(|| file.file_name().map(PathBuf::from))?;

        Some(output_dir.join(relative).with_extension(self.format.extension()))
    }
}

impl BatchDecoder<NullProgress> {
    /// Create a decoder without progress reporting.
    pub fn without_progress() -> Self {
        Self::new(NullProgress)
    }
}
