//! Tiled JPEG 2000 Raster Reader
//!
//! Delivers decoded JPEG 2000 images as rasters, tile by tile, from a
//! decode chain that produces samples one tile and one window at a time.
//!
//! # Features
//!
//! - **Region reads**: any source rectangle, with independent horizontal
//!   and vertical subsampling and a subsampling phase
//! - **Band control**: select, reorder and place bands in the destination
//! - **Sample layouts**: packed 1/2/4-bit, byte, short and int rasters
//!   chosen from bit depth and band count
//! - **Channel definitions**: color channels routed to their components
//! - **Progress and cancellation**: events per scanline, cancellation
//!   observed within one scanline
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use j2k_tile_reader::{RegionRequest, SampleDump};
//! use j2k_tile_reader::progress::NullProgress;
//!
//! let mut reader = SampleDump::load("scan.toml".as_ref())?.open()?;
//!
//! // Every second column, starting at column 1
//! let request = RegionRequest::full_image().subsampling(2, 1, 1, 0);
//! let outcome = reader.decode_region(&request, None, NullProgress)?;
//! outcome.raster.to_dynamic_image()?.save("scan.png")?;
//! ```
//!
//! # Decode chains
//!
//! Anything implementing [`DecodeChain`] can feed a [`TileReader`]. The
//! crate ships [`PlanarChain`], which serves fully reconstructed component
//! planes from memory and backs the [`SampleDump`] file format.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod chain;
pub mod cli;
pub mod config;
pub mod dump;
pub mod error;
pub mod geometry;
pub mod header;
pub mod normalize;
pub mod progress;
pub mod raster;
pub mod reader;

// Re-export commonly used types
pub use chain::{DecodeChain, Fidelity, PlanarChain, TileWindow};
pub use config::{Point, Rect, RegionRequest};
pub use dump::SampleDump;
pub use error::{ReaderError, Result};
pub use header::{ChannelAssociation, ChannelMap, ChannelType, CodestreamHeader, ComponentInfo};
pub use raster::{resolve_sample_layout, ColorDescription, LayoutDescriptor, Raster, SampleKind};
pub use reader::{
    ComponentDescriptor, DecodedImage, ReadOutcome, ReadStatus, ReadSummary, SessionInfo,
    TileReader,
};

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}
