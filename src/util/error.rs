//! Error types for yolopost.

use thiserror::Error;

/// Result alias for yolopost operations.
pub type YoloPostResult<T> = std::result::Result<T, YoloPostError>;

/// Errors reported by configuration checks and buffer/shape validation.
///
/// Lossy filtering (low-confidence candidates, capacity overflow, suppressed
/// overlaps) is never reported as an error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum YoloPostError {
    /// A configuration value is out of range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// Width or height is zero or otherwise unusable.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A buffer holds fewer elements than its declared shape requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A tensor or collection does not have the shape the configuration expects.
    #[error("shape mismatch for {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// The inference engine collaborator failed.
    #[error("engine failure: {reason}")]
    Engine { reason: String },
    /// Image decoding or loading failed.
    #[cfg(feature = "image-io")]
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}
