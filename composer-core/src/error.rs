//! Error types for layer operations.

use thiserror::Error;

/// Result type for layer operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur in layer operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// Layer not found in the stack.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Canvas dimensions must both be positive.
    #[error("Invalid canvas size: {width}x{height}")]
    InvalidCanvasSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}
