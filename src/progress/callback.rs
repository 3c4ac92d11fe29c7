//! Closure-based progress handler.

use crate::config::Rect;
use crate::error::ReaderError;
use crate::reader::ReadSummary;

use super::cancel::CancelToken;
use super::handler::{ProgressEvent, ProgressHandler};

type EventHook = Box<dyn Fn(&ProgressEvent) + Send + Sync>;
type RowsHook = Box<dyn Fn((u32, u32), Rect) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&ReaderError) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&ReadSummary) + Send + Sync>;

/// Progress handler assembled from optional closures.
///
/// `on_rows` receives the tile and the destination rectangle of every
/// scanline as it is stored, which is what an incremental display needs
/// to repaint.
///
/// # Example
///
/// ```rust,ignore
/// use j2k_tile_reader::progress::CallbackProgress;
///
/// let progress = CallbackProgress::new()
///     .on_rows(|tile, rows| repaint(rows))
///     .on_complete(|summary| println!("{}", summary.status));
///
/// let stop = progress.cancel_token();
/// reader.decode_full_image(&progress)?;
/// ```
#[derive(Default)]
pub struct CallbackProgress {
    events: Option<EventHook>,
    rows: Option<RowsHook>,
    error: Option<ErrorHook>,
    complete: Option<CompleteHook>,
    cancel: CancelToken,
}

impl CallbackProgress {
    /// Handler with no hooks and its own cancel token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with every event, including the start event.
    pub fn on_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.events = Some(Box::new(hook));
        self
    }

    /// Called once per stored scanline with its tile and destination rows.
    pub fn on_rows<F>(mut self, hook: F) -> Self
    where
        F: Fn((u32, u32), Rect) + Send + Sync + 'static,
    {
        self.rows = Some(Box::new(hook));
        self
    }

    /// Called when a read fails.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReaderError) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(hook));
        self
    }

    /// Called when a read completes or aborts.
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReadSummary) + Send + Sync + 'static,
    {
        self.complete = Some(Box::new(hook));
        self
    }

    /// Observe `token` instead of a private one.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops reads driven by this handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop the current read before its next scanline.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ProgressHandler for CallbackProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(hook) = &self.events {
            hook(event);
        }
        if let (Some(hook), Some(tile), Some(rows)) = (&self.rows, event.tile, event.updated) {
            hook(tile, rows);
        }
    }

    fn on_error(&self, error: &ReaderError) {
        if let Some(hook) = &self.error {
            hook(error);
        }
    }

    fn on_complete(&self, summary: &ReadSummary) {
        if let Some(hook) = &self.complete {
            hook(summary);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
