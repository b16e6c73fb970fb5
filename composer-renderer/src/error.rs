//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while decoding, compositing or exporting.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Input is not an accepted image type.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Output could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Resource loading failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// A background decode task panicked or was aborted.
    #[error("Decode task failed: {0}")]
    TaskJoin(String),

    /// Writing exported bytes failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
