//! Progress forwarded to a display thread.
//!
//! The reading thread sends compact [`ReadUpdate`]s. The display side
//! folds them into a [`ProgressReceiver`]: the fraction so far, the
//! destination rectangle written since it last repainted, and the final
//! outcome.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use log::trace;

use crate::config::Rect;
use crate::error::ReaderError;
use crate::reader::ReadSummary;

use super::cancel::CancelToken;
use super::handler::{ProgressEvent, ProgressHandler, ProgressPhase};

/// What the reading thread reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadUpdate {
    /// The read resolved its tile range.
    Started {
        /// Tiles in the range.
        total_tiles: usize,
    },
    /// One scanline of `tile` was stored at `rows`.
    Rows {
        /// Tile the scanline came from.
        tile: (u32, u32),
        /// Destination rectangle written.
        rows: Rect,
        /// Progress after this scanline.
        fraction: f64,
    },
    /// The read returned; the status tells complete from aborted.
    Finished(ReadSummary),
    /// The read failed.
    Failed(String),
}

/// Handler that forwards a read to a [`ProgressReceiver`].
///
/// Both ends share one cancel token, so the display side can stop the
/// read.
pub struct ChannelProgress {
    sender: Sender<ReadUpdate>,
    cancel: CancelToken,
}

impl ChannelProgress {
    /// Connected handler and receiver.
    pub fn new() -> (Self, ProgressReceiver) {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        let handler = Self {
            sender,
            cancel: cancel.clone(),
        };
        (handler, ProgressReceiver::new(receiver, cancel))
    }

    fn send(&self, update: ReadUpdate) {
        // Receiver may have been dropped
        let _ = self.sender.send(update);
    }
}

impl ProgressHandler for ChannelProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match (event.phase, event.tile, event.updated) {
            (ProgressPhase::Started, _, _) => self.send(ReadUpdate::Started {
                total_tiles: event.total_tiles,
            }),
            (ProgressPhase::Decoding, Some(tile), Some(rows)) => self.send(ReadUpdate::Rows {
                tile,
                rows,
                fraction: event.fraction,
            }),
            _ => {}
        }
    }

    fn on_error(&self, error: &ReaderError) {
        self.send(ReadUpdate::Failed(error.to_string()));
    }

    fn on_complete(&self, summary: &ReadSummary) {
        self.send(ReadUpdate::Finished(summary.clone()));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Display-side view of a read running on another thread.
pub struct ProgressReceiver {
    receiver: Receiver<ReadUpdate>,
    cancel: CancelToken,
    damage: Option<Rect>,
    fraction: f64,
    total_tiles: usize,
    current_tile: Option<(u32, u32)>,
    outcome: Option<std::result::Result<ReadSummary, String>>,
}

impl ProgressReceiver {
    fn new(receiver: Receiver<ReadUpdate>, cancel: CancelToken) -> Self {
        Self {
            receiver,
            cancel,
            damage: None,
            fraction: 0.0,
            total_tiles: 0,
            current_tile: None,
            outcome: None,
        }
    }

    /// Wait up to `timeout` for the next update, then apply everything
    /// already queued. Returns the number of updates applied.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        if self.outcome.is_some() {
            return 0;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(update) => self.apply(update),
            Err(RecvTimeoutError::Timeout) => return 0,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected();
                return 0;
            }
        }

        let mut applied = 1;
        while let Ok(update) = self.receiver.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    /// Block until the read reports its outcome.
    pub fn wait(&mut self) -> std::result::Result<ReadSummary, String> {
        while self.outcome.is_none() {
            match self.receiver.recv() {
                Ok(update) => self.apply(update),
                Err(_) => self.disconnected(),
            }
        }
        self.outcome
            .clone()
            .unwrap_or_else(|| Err("Read ended without a result".into()))
    }

    /// Destination area written since the last call, as one bounding
    /// rectangle.
    pub fn take_damage(&mut self) -> Option<Rect> {
        self.damage.take()
    }

    /// Progress of the read, 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Tiles in the read's range, once it started.
    pub fn total_tiles(&self) -> usize {
        self.total_tiles
    }

    /// Tile of the latest scanline.
    pub fn current_tile(&self) -> Option<(u32, u32)> {
        self.current_tile
    }

    /// Summary or failure message, once the read returned.
    pub fn outcome(&self) -> Option<&std::result::Result<ReadSummary, String>> {
        self.outcome.as_ref()
    }

    /// Whether the read returned.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Stop the read before its next scanline.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the reading side.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn apply(&mut self, update: ReadUpdate) {
        trace!("Progress update {:?}", update);
        match update {
            ReadUpdate::Started { total_tiles } => {
                self.total_tiles = total_tiles;
                self.fraction = 0.0;
            }
            ReadUpdate::Rows {
                tile,
                rows,
                fraction,
            } => {
                self.damage = Some(match self.damage {
                    Some(damage) => damage.union(&rows),
                    None => rows,
                });
                self.current_tile = Some(tile);
                self.fraction = fraction;
            }
            ReadUpdate::Finished(summary) => {
                self.fraction = summary.fraction;
                self.outcome = Some(Ok(summary));
            }
            ReadUpdate::Failed(message) => self.outcome = Some(Err(message)),
        }
    }

    fn disconnected(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(Err("Read ended without a result".into()));
        }
    }
}
