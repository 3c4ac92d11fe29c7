//! Progress handler trait and related types.

use crate::config::Rect;
use crate::error::ReaderError;
use crate::reader::ReadSummary;

/// Phase of a read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Request validated, tile range resolved.
    Started,
    /// Scanlines are being delivered.
    Decoding,
    /// Every tile in range was processed.
    Complete,
    /// Cancellation was observed; the raster is partially filled.
    Aborted,
    /// The read failed.
    Failed,
}

impl ProgressPhase {
    /// Get a human-readable description of the phase.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Started => "Starting",
            Self::Decoding => "Decoding",
            Self::Complete => "Complete",
            Self::Aborted => "Aborted",
            Self::Failed => "Failed",
        }
    }

    /// Check if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted | Self::Failed)
    }
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Progress event emitted during a read.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Current phase.
    pub phase: ProgressPhase,

    /// Tile being processed.
    pub tile: Option<(u32, u32)>,

    /// Tiles fully processed so far.
    pub tiles_completed: usize,

    /// Tiles in the iteration range.
    pub total_tiles: usize,

    /// Overall progress (0.0 to 1.0), non-decreasing within one call.
    pub fraction: f64,

    /// Destination rectangle written since the previous event.
    pub updated: Option<Rect>,

    /// Status message.
    pub message: String,
}

impl Default for ProgressEvent {
    fn default() -> Self {
        Self {
            phase: ProgressPhase::Started,
            tile: None,
            tiles_completed: 0,
            total_tiles: 0,
            fraction: 0.0,
            updated: None,
            message: String::new(),
        }
    }
}

impl ProgressEvent {
    /// Create a new progress event for a specific phase.
    pub fn new(phase: ProgressPhase) -> Self {
        Self {
            phase,
            message: phase.description().into(),
            ..Default::default()
        }
    }

    /// Read started over `total_tiles` tiles producing `destination`.
    pub fn started(total_tiles: usize, destination: Rect) -> Self {
        Self {
            phase: ProgressPhase::Started,
            total_tiles,
            message: format!("Reading {} from {} tiles", destination, total_tiles),
            ..Default::default()
        }
    }

    /// A scanline of tile `tile` was written at `updated`.
    pub fn decoding(
        tile: (u32, u32),
        tiles_completed: usize,
        total_tiles: usize,
        fraction: f64,
        updated: Rect,
    ) -> Self {
        Self {
            phase: ProgressPhase::Decoding,
            tile: Some(tile),
            tiles_completed,
            total_tiles,
            fraction,
            updated: Some(updated),
            message: format!("Tile ({}, {})", tile.0, tile.1),
        }
    }

    /// Read finished or stopped as described by `summary`.
    pub fn finished(summary: &ReadSummary) -> Self {
        let phase = if summary.status.is_complete() {
            ProgressPhase::Complete
        } else {
            ProgressPhase::Aborted
        };
        Self {
            phase,
            tiles_completed: summary.tiles_processed,
            total_tiles: summary.total_tiles,
            fraction: summary.fraction,
            message: format!(
                "{} {} of {} tiles",
                phase, summary.tiles_processed, summary.total_tiles
            ),
            ..Default::default()
        }
    }

    /// Create a failure event.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: ProgressPhase::Failed,
            message: message.into(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.total_tiles > 0 {
            write!(
                f,
                "[{}/{}] {}: {}",
                self.tiles_completed, self.total_tiles, self.phase, self.message
            )
        } else {
            write!(f, "{}: {}", self.phase, self.message)
        }
    }
}

/// Receiver of read progress and source of cancellation.
///
/// The reader calls [`on_progress`](Self::on_progress) after every
/// scanline and polls [`is_cancelled`](Self::is_cancelled) before every
/// scanline, so a cancellation is honored within one scanline.
///
/// # Example
///
/// ```rust,ignore
/// use j2k_tile_reader::progress::{ProgressHandler, ProgressEvent};
///
/// struct Printer;
///
/// impl ProgressHandler for Printer {
///     fn on_progress(&self, event: &ProgressEvent) {
///         println!("{:.1}%", event.fraction * 100.0);
///     }
/// }
/// ```
pub trait ProgressHandler: Send + Sync {
    /// Called when progress is updated.
    fn on_progress(&self, event: &ProgressEvent);

    /// Called when a read fails.
    fn on_error(&self, error: &ReaderError) {
        let _ = error;
    }

    /// Called when a read completes or is aborted.
    fn on_complete(&self, summary: &ReadSummary) {
        let _ = summary;
    }

    /// Check if the read should stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<P: ProgressHandler + ?Sized> ProgressHandler for &P {
    fn on_progress(&self, event: &ProgressEvent) {
        (**self).on_progress(event)
    }

    fn on_error(&self, error: &ReaderError) {
        (**self).on_error(error)
    }

    fn on_complete(&self, summary: &ReadSummary) {
        (**self).on_complete(summary)
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// A no-op progress handler that does nothing.
///
/// Use this when you don't need progress reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressHandler for NullProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
