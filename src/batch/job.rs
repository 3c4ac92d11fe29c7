//! Batch job definitions.

use std::path::PathBuf;

use crate::error::ReaderError;
use crate::reader::{ReadStatus, ReadSummary};

/// Status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Job is waiting for a worker.
    Pending,
    /// Every tile was read and the output written.
    Completed,
    /// The read observed cancellation; nothing was written.
    Aborted,
    /// Loading, reading or writing failed.
    Failed,
    /// The batch was cancelled before the job started.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check if the job produced an output file.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Completed => write!(f, "Completed"),
            Self::Aborted => write!(f, "Aborted"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// One sample dump to decode.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Position in the batch.
    pub id: u64,

    /// Dump descriptor path.
    pub source_path: PathBuf,

    /// Where the decoded raster goes.
    pub output_path: Option<PathBuf>,
}

impl BatchJob {
    /// Create a new batch job.
    pub fn new(id: u64, source_path: PathBuf) -> Self {
        Self {
            id,
            source_path,
            output_path: None,
        }
    }

    /// Set the output path.
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    /// Get the file name.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Result of a batch job.
#[derive(Debug)]
pub struct JobResult {
    /// The job that was processed.
    pub job: BatchJob,

    /// Summary of the read, if it ran to a status.
    pub summary: Option<ReadSummary>,

    /// Error (if failed).
    pub error: Option<ReaderError>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl JobResult {
    /// Job skipped because the batch was cancelled.
    pub fn cancelled(job: BatchJob) -> Self {
        Self {
            job,
            summary: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Check if the job was successful.
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Get the status based on the result.
    pub fn status(&self) -> JobStatus {
        match (&self.error, &self.summary) {
            (Some(_), _) => JobStatus::Failed,
            (None, Some(s)) if s.status == ReadStatus::Complete => JobStatus::Completed,
            (None, Some(_)) => JobStatus::Aborted,
            (None, None) => JobStatus::Cancelled,
        }
    }

    /// Tiles the read got through.
    pub fn tiles_processed(&self) -> usize {
        self.summary.as_ref().map_or(0, |s| s.tiles_processed)
    }
}

impl std::fmt::Display for JobResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref error) = self.error {
            return write!(f, "{}: {} - {}", self.job.file_name(), self.status(), error);
        }
        match self.summary {
            Some(ref summary) => write!(
                f,
                "{}: {} ({}/{} tiles, {}, time: {}ms)",
                self.job.file_name(),
                self.status(),
                summary.tiles_processed,
                summary.total_tiles,
                summary.destination,
                self.duration_ms
            ),
            None => write!(f, "{}: {}", self.job.file_name(), self.status()),
        }
    }
}
