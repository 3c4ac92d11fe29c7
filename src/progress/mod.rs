//! Progress reporting and cooperative cancellation for reads.
//!
//! The reader emits one start event, then one event per stored scanline
//! carrying the destination rows it wrote. Handlers:
//! - [`CallbackProgress`]: closures for events, rows, errors and completion
//! - [`ChannelProgress`]: forwards to a [`ProgressReceiver`] on a display
//!   thread, which merges written rows into a repaint rectangle
//! - [`CancelToken`]: a shared flag, polled before every scanline
//!
//! # Example
//!
//! ```rust,ignore
//! use j2k_tile_reader::progress::CallbackProgress;
//!
//! let progress = CallbackProgress::new().on_event(|event| {
//!     println!("Progress: {:.1}%", event.fraction * 100.0);
//! });
//!
//! let outcome = reader.decode_full_image(&progress)?;
//! ```

mod callback;
mod cancel;
mod channel;
mod handler;

pub use callback::CallbackProgress;
pub use cancel::CancelToken;
pub use channel::{ChannelProgress, ProgressReceiver, ReadUpdate};
pub use handler::{NullProgress, ProgressEvent, ProgressHandler, ProgressPhase};
