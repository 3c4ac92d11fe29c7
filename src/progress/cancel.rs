//! Shared cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::handler::{ProgressEvent, ProgressHandler};

/// Cancellation flag shared between a read and whoever may stop it.
///
/// Clones observe the same flag. The reader polls it before every tile
/// and every scanline, so a cancel lands within one scanline.
///
/// A token is itself a handler that ignores events, for callers that only
/// need to stop a read:
///
/// ```rust,ignore
/// let token = CancelToken::new();
/// let stopper = token.clone();
/// std::thread::spawn(move || stopper.cancel());
/// let outcome = reader.decode_full_image(&token)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every read observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the token can drive another read.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether a cancel was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl ProgressHandler for CancelToken {
    fn on_progress(&self, _event: &ProgressEvent) {}

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
