//! Error types for the tiled JPEG 2000 reader.

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Main error type for the reader.
///
/// Cancellation is deliberately absent: an aborted read is reported through
/// [`crate::reader::ReadStatus::Aborted`] on a successful outcome.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Inconsistent header data (e.g. mixed component subsampling).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bit depth outside the range any raster layout can hold.
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    /// Malformed channel association table.
    #[error("Invalid channel definition: {0}")]
    ChannelDefinition(String),

    /// Rejected read parameters; raised before any tile is touched.
    #[error("Invalid read request: {0}")]
    InvalidRequest(String),

    /// The decode chain failed to produce tile data.
    #[error("Decode chain error: {0}")]
    Chain(String),

    /// Raster access outside its bounds or with a mismatched layout.
    #[error("Raster error: {0}")]
    Raster(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed sample dump descriptor or session summary encoding.
    #[error("Descriptor error: {0}")]
    Descriptor(String),

    /// Raster could not be converted or encoded as an image file.
    #[error("Image export error: {0}")]
    Export(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReaderError {
    /// True for errors raised once at session initialization.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedBitDepth(_) | Self::ChannelDefinition(_)
        )
    }

    /// True for errors raised synchronously from a read entry point.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// True for errors propagated from the decode chain.
    pub fn is_chain(&self) -> bool {
        matches!(self, Self::Chain(_))
    }
}

impl From<toml::de::Error> for ReaderError {
    fn from(err: toml::de::Error) -> Self {
        ReaderError::Descriptor(err.to_string())
    }
}

impl From<toml::ser::Error> for ReaderError {
    fn from(err: toml::ser::Error) -> Self {
        ReaderError::Descriptor(err.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::Descriptor(err.to_string())
    }
}

impl From<image::ImageError> for ReaderError {
    fn from(err: image::ImageError) -> Self {
        ReaderError::Export(err.to_string())
    }
}
